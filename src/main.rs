#[tokio::main]
async fn main() {
    if let Err(err) = studio_booking::run().await {
        eprintln!("studio-booking: {err}");
        std::process::exit(1);
    }
}
