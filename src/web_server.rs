use std::sync::Arc;

use actix_web::{App, HttpServer, dev::Server, middleware, web};

use crate::config::ServerConfig;
use crate::routes::{get_job_handler, json_error_handler, post_job_handler};
use crate::scheduler::Scheduler;

pub fn build_server(config: ServerConfig, scheduler: Arc<Scheduler>) -> std::io::Result<Server> {
    let scheduler = web::Data::new(scheduler);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(scheduler.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .wrap(middleware::Logger::default())
            .service(post_job_handler)
            .service(get_job_handler)
    })
    .bind((
        config.bind_address.unwrap_or("127.0.0.1".to_string()),
        config.bind_port.unwrap_or(3356),
    ))?
    .run();

    Ok(server)
}
