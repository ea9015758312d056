#[actix_web::main]
async fn main() -> std::io::Result<()> {
    docgen_server::run().await
}
