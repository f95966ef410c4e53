//! Summarize an exported dataset.

use std::path::PathBuf;

use touchset_dataset_store::DatasetReader;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let mut reader =
        DatasetReader::open(&path).map_err(|e| anyhow::anyhow!("Failed to open dataset: {e}"))?;

    println!("Dataset: {}", path.display());
    match reader.schema() {
        Some(schema) => {
            println!("  Format version: {}", schema.format_version);
            println!(
                "  Images: {0}x{0}x{1} ({2} values per record)",
                schema.image_side,
                schema.channels,
                schema.image_len()
            );
            println!("  Attributes: {}", schema.attribute_names.join(", "));
            println!("  Created: {}", schema.created_at);
        }
        None => println!("  Schema: none (no records were written)"),
    }

    let attributes = reader.all_attributes()?;
    let positives = attributes.iter().filter(|a| a.label).count();
    let matched = attributes.iter().filter(|a| a.point.is_matched()).count();

    println!("  Records: {} in {} chunk(s)", reader.len(), reader.chunk_count());
    println!("  Touch labels: {positives}");
    println!("  Matched points: {matched}");
    if reader.is_finalized() {
        println!("  Finalized: yes");
    } else {
        println!("  Finalized: NO (export was interrupted; trailing records may be missing)");
    }

    Ok(())
}
