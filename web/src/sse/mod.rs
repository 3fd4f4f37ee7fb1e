pub(crate) mod handler;

pub(crate) use handler::stream_handler;
