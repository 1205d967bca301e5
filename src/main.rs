#[tokio::main]
async fn main() {
    let code = ackgate::app::startup::startup().await;
    std::process::exit(code);
}
