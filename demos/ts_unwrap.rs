use std::env;
use tokio::fs;
use tsmeta::format::ts::clip;
use tsmeta::format::ts::parser::{extract_meta, find_psi};
use tsmeta::TsError;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let (input, output) = match (args.next(), args.next()) {
        (Some(i), Some(o)) => (i, o),
        _ => {
            eprintln!("usage: ts_unwrap <input.ts> <output>");
            std::process::exit(2);
        }
    };

    let data = fs::read(&input).await?;
    println!("Read {} bytes from {}", data.len(), input);

    let info = find_psi(&data)?;
    for (pid, stream_type) in &info.streams {
        println!("PID {:#06x}: stream type {}", pid, stream_type);
    }

    match extract_meta(&data) {
        Ok(meta) => {
            if let Some(codec) = meta.get("codec") {
                println!("codec: {}", codec);
            }
            let mut keys: Vec<_> = meta.keys().collect();
            keys.sort();
            for k in keys {
                println!("  {} = {}", k, meta[k]);
            }
        }
        Err(TsError::NoMeta) => println!("no metadata in stream"),
        Err(e) => return Err(e.into()),
    }

    let c = clip::extract(&data)?;
    if let (Some(first), Some(last)) = (c.frames().first(), c.frames().last()) {
        println!(
            "{} frames, PTS {} to {}",
            c.len(),
            first.pts,
            last.pts
        );
    }

    let media = c.bytes();
    fs::write(&output, &media).await?;
    println!("Wrote {} media bytes to {}", media.len(), output);
    Ok(())
}
