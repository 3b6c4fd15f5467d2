use std::env;
use std::fs;
use std::process;

use smooth_manifest::parse_manifest;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <manifest.xml> [manifest-url]", args[0]);
        process::exit(1);
    }

    let filename = &args[1];
    let manifest_url = args.get(2).map(String::as_str).unwrap_or(filename);

    let xml = match fs::read_to_string(filename) {
        Ok(x) => x,
        Err(e) => {
            eprintln!("Failed to read file '{}': {}", filename, e);
            process::exit(1);
        }
    };

    let info = match parse_manifest(&xml, manifest_url) {
        Ok(info) => info,
        Err(e) => {
            eprintln!("Failed to parse manifest: {}", e);
            process::exit(1);
        }
    };

    println!(
        "Manifest v{}.{}, duration {:?}, {} stream(s), {} marker(s)\n",
        info.major_version,
        info.minor_version,
        info.duration(),
        info.streams.len(),
        info.markers.len()
    );

    for stream in &info.streams {
        println!(
            "Stream {} ({}), language '{}', {} chunks:",
            stream.stream_index, stream.media_type, stream.language, stream.chunk_count
        );
        for (bitrate, attrs) in &stream.bitrates {
            let fourcc = attrs.get("FourCC").map(String::as_str).unwrap_or("-");
            let width = attrs.get("Width").map(String::as_str).unwrap_or("-");
            let height = attrs.get("Height").map(String::as_str).unwrap_or("-");
            println!("  {:>9} bps  {}  {}x{}", bitrate, fourcc, width, height);
        }
        println!("  url template: {}", stream.base_url);
    }

    for marker in &info.markers {
        println!(
            "Marker at {} [{}]: {}",
            marker.time, marker.marker_type, marker.text
        );
    }
}
