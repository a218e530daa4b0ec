#[tokio::main]
async fn main() {
    if let Err(e) = nav_dashboard::run().await {
        eprintln!("nav-dashboard: {e}");
        std::process::exit(1);
    }
}
