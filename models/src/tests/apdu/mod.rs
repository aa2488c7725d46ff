mod command;
mod response;
mod serialized;
