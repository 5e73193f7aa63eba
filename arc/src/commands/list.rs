use arc_format::{FsTree, HashRegistry, MappedArcFile};

use crate::cli::ListArgs;
use crate::error::{Error, Result};
use crate::util::{format_size, load_registry, open_archive};

pub fn run(args: ListArgs) -> Result<()> {
    let arc = open_archive(&args.archive.archive)?;
    let registry = load_registry(&arc, args.archive.dictionary.as_deref())?;

    if args.tree {
        list_tree(&arc, &registry)
    } else {
        list_files(&arc, &registry);
        Ok(())
    }
}

fn list_files(arc: &MappedArcFile, registry: &HashRegistry) {
    println!(
        "{:>7}  {:10}  {:>12}  {:>12}  Path",
        "Index", "Method", "Stored", "Size"
    );
    println!("{}", "-".repeat(72));

    for (index, file) in arc.primary().files().iter().enumerate() {
        let path = registry
            .text(file.path)
            .map(str::to_string)
            .unwrap_or_else(|| file.path.to_string());

        match arc.resolve_file_location(index) {
            Ok(location) => {
                let link = if location.file_index != index {
                    format!(" -> {:#07x}", location.file_index)
                } else {
                    String::new()
                };

                println!(
                    "{:#07x}  {:10}  {:>12}  {:>12}  {}{}",
                    index,
                    location.compression.to_string(),
                    format_size(location.stored_len()),
                    format_size(location.logical_size),
                    path,
                    link,
                );
            }
            Err(e) => {
                println!(
                    "{:#07x}  {:10}  {:>12}  {:>12}  {} ({})",
                    index, "<error>", "-", "-", path, e
                );
            }
        }
    }
}

fn list_tree(arc: &MappedArcFile, registry: &HashRegistry) -> Result<()> {
    let tree = FsTree::from_archive(arc, registry).map_err(|source| Error::BuildTree { source })?;

    for node in tree.iter() {
        if node.is_dir() && !node.display_path.ends_with('/') {
            println!("{}/", node.display_path);
        } else {
            println!("{}", node.display_path);
        }
    }

    Ok(())
}
