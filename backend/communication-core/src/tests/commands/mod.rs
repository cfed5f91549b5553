mod definition;
mod hub;
mod mapper;
