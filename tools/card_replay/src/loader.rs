use std::{fs, path::Path};

use anyhow::{anyhow, Context, Result};
use sdreader::driver::memory::{encode_short_name, MemoryCard};

/// Mirrors a host directory tree into an in-memory card. Names that do not
/// fit 8.3 get a `NAME~N.EXT` alias and keep the host name as long name.
pub fn load_dir(root: &Path) -> Result<MemoryCard> {
    let mut card = MemoryCard::new();
    load_into(&mut card, root, "")?;
    Ok(card)
}

fn load_into(card: &mut MemoryCard, dir: &Path, card_dir: &str) -> Result<()> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut aliases = 0u32;
    for entry in entries {
        let host_name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type()?;
        let (short, long) = if encode_short_name(&host_name).is_ok() {
            (host_name.clone(), None)
        } else {
            aliases += 1;
            (short_alias(&host_name, aliases), Some(host_name.as_str()))
        };
        let card_path = format!("{card_dir}/{short}");

        let added = if file_type.is_dir() {
            match long {
                Some(long) => card.add_dir_with_long_name(&card_path, long),
                None => card.add_dir(&card_path),
            }
        } else if file_type.is_file() {
            let data = fs::read(entry.path())
                .with_context(|| format!("failed to read {}", entry.path().display()))?;
            match long {
                Some(long) => card.add_file_with_long_name(&card_path, long, &data),
                None => card.add_file(&card_path, &data),
            }
        } else {
            continue;
        };
        added.map_err(|err| anyhow!("cannot place {host_name} at {card_path}: {err:?}"))?;

        if file_type.is_dir() {
            load_into(card, &entry.path(), &card_path)?;
        }
    }
    Ok(())
}

fn short_alias(name: &str, n: u32) -> String {
    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => (&name[..dot], &name[dot + 1..]),
        _ => (name, ""),
    };
    let tail = format!("~{n}");
    let mut base = clean(stem, 8usize.saturating_sub(tail.len()).max(1));
    if base.is_empty() {
        base.push('_');
    }
    let ext = clean(ext, 3);
    if ext.is_empty() {
        format!("{base}{tail}")
    } else {
        format!("{base}{tail}.{ext}")
    }
}

fn clean(text: &str, max: usize) -> String {
    text.chars()
        .filter(char::is_ascii_alphanumeric)
        .take(max)
        .collect::<String>()
        .to_ascii_uppercase()
}
