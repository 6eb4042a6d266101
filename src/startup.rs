use std::net::TcpListener;

use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};

use crate::{
    routes::{default_route, scrape_route},
    services::ProcessRegistry,
};

pub fn run(listener: TcpListener, registry: ProcessRegistry) -> Result<Server, std::io::Error> {
    let registry = web::Data::new(registry);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(default_route::health)
            .service(
                web::scope("/scrape")
                    .service(scrape_route::start_scrape)
                    .service(scrape_route::get_progress)
                    .service(scrape_route::get_result)
                    .service(scrape_route::cancel_scrape),
            )
            .app_data(registry.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
