// demos/folder_transfer.rs
// Run with: cargo run --example folder_transfer -- /docs /backup
//
// Reads endpoint settings from WEBDAV_CLOUD_URL, WEBDAV_CLOUD_USERNAME,
// WEBDAV_CLOUD_PASSWORD, WEBDAV_NAS_URL, WEBDAV_NAS_USERNAME and
// WEBDAV_NAS_PASSWORD.

use webdav_sync::{Endpoint, TransferClient, TransferClientConfig};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let folder = args.next().unwrap_or_else(|| "/".to_string());
    let destination = args.next().unwrap_or_else(|| "/".to_string());
    let overwrite = args.next().is_some_and(|flag| flag == "--overwrite");

    // 1. Build a client from the environment
    let client = TransferClient::new(TransferClientConfig::from_env()?);

    // 2. Browse the source folder
    println!("📂 Listing {folder} on the cloud...");
    for entry in client.list_entries(Endpoint::Cloud, &folder).await? {
        let kind = if entry.is_directory { "dir " } else { "file" };
        println!("  {kind} {} ({} bytes)", entry.path, entry.size);
    }

    // 3. Copy the whole tree to the NAS
    println!("\n⬆️  Transferring {folder} -> {destination} (overwrite: {overwrite})...");
    let result = client
        .transfer_folder(&folder, &destination, overwrite)
        .await?;

    println!(
        "✅ {}/{} files transferred",
        result.success_count(),
        result.total_count()
    );
    for file in result.failed_files() {
        if result.skipped_files().contains(file) {
            println!("  ⏭️  skipped (exists): {file}");
        } else {
            println!("  ❌ failed: {file}");
        }
    }

    Ok(())
}
