mod adapter;
mod end_to_end;
mod helpers;
mod http;
mod http_server;
mod proxies;
mod ws;
