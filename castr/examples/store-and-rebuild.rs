use castr::api::{encode_blob, EncodeOptions};
use castr::assemble;
use castr::store::LocalStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let input_path = std::env::args().nth(1).expect("input file argument");
    let store_path = "example.castr";
    let output_path = "rebuilt.out";

    // Chunk the input into a local store and keep the resulting index.
    let store = LocalStore::new(store_path);
    let input = tokio::fs::File::open(&input_path).await?;
    let result = encode_blob(input, &store, &EncodeOptions::default()).await?;
    println!(
        "Chunked {} into {} chunks ({} unique, {} newly stored)",
        input_path,
        result.index.len(),
        result.unique_chunks,
        result.stored_chunks
    );

    // Rebuild the input bit-exact from the index and the store.
    let stats = assemble::to_file(
        &result.index,
        &store,
        std::path::Path::new(output_path),
        &assemble::Options::default().verify_output(true),
    )
    .await?;
    println!(
        "Rebuilt {} bytes to {} (verified: {})",
        stats.bytes_written, output_path, stats.verification_passed
    );
    Ok(())
}
