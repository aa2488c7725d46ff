mod builder;
mod serialized;
