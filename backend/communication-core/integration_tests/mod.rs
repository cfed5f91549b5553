mod commands;
mod handshake;
mod helpers;
mod notifications;
