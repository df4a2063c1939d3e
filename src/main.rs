#[actix_web::main]
async fn main() -> std::io::Result<()> {
    qrbill_docs_server::run().await
}
