mod cli;
mod commands;
mod infra;
mod pipeline;
mod routes;
mod server;

use inspection_scheduler::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
