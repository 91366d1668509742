//! HTTP server setup

use std::net::TcpListener;
use std::sync::Arc;

use actix_web::{App, HttpServer, dev::Server, middleware::Logger, web};

use crate::api;
use crate::model::AppState;

/// Bind the lock API on `address:port`
pub fn lock_server(app_state: Arc<AppState>, address: String, port: u16) -> Result<Server, std::io::Error> {
    Ok(HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::from(app_state.clone()))
            .configure(api::configure)
    })
    .disable_signals()
    .bind((address, port))?
    .run())
}

/// Serve the lock API on an already bound listener (port 0 in tests)
pub fn lock_server_on(app_state: Arc<AppState>, listener: TcpListener) -> Result<Server, std::io::Error> {
    Ok(HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::from(app_state.clone()))
            .configure(api::configure)
    })
    .disable_signals()
    .listen(listener)?
    .run())
}
