mod envelope;
mod frame;
mod method;
