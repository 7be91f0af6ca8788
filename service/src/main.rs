use crate::config::Config;
use crate::logging::logger_setup;
use crate::repository::volume_repository::VolumeRepository;
use crate::router::router;
use crate::service::ImageService;
use dotenv::dotenv;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

mod config;
mod domain;
mod logging;
mod multipart;
mod observability;
mod repository;
mod response_handler;
mod router;
mod server_timing;
mod service;

#[derive(Clone)]
pub struct TokioExecutor;

impl<F> hyper::rt::Executor<F> for TokioExecutor
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    fn execute(&self, fut: F) {
        tokio::task::spawn(fut);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = Config::from_env()?;

    if let Err(err) = logger_setup(config.log_format) {
        eprintln!("Could not install logger: {err}");
    }

    let repository = VolumeRepository::new(&config.upload_dir);
    info!("Serving images from {}", repository.root().display());
    let service = Arc::new(ImageService::new(repository, config.max_upload_bytes));

    let addr = config.addr;
    info!("Attempting to start server at {addr}");
    let listener = TcpListener::bind(addr).await?;
    info!("Server started at {addr}");

    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let service = Arc::clone(&service);

        tokio::task::spawn(async move {
            let handler = service_fn(move |req| router(req, Arc::clone(&service)));
            if let Err(err) = auto::Builder::new(TokioExecutor)
                .serve_connection(io, handler)
                .await
            {
                error!("Error serving connection from {peer}: {err:?}");
            }
        });
    }
}
