use std::env;
use std::fs;
use std::process;

use fmp4_box::chunk::ChunkParser;
use fmp4_box::writer::{build_chunk, ChunkWriterConfig, SampleSpec};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <chunk.m4f> | --test", args[0]);
        process::exit(1);
    }

    if args[1] == "--test" {
        run_test_mode();
    } else {
        run_file_mode(&args[1]);
    }
}

fn run_file_mode(filename: &str) {
    let data = match fs::read(filename) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to read file '{}': {}", filename, e);
            process::exit(1);
        }
    };

    let mut parser = ChunkParser::new();
    parser.feed(&data);
    dump_chunk(&mut parser, filename);
}

fn run_test_mode() {
    println!("Running in TEST mode...");

    let config = ChunkWriterConfig {
        track_id: 2,
        sequence_number: 7,
        sample_ivs: Some(vec![vec![0x11; 8], vec![0x22; 8], vec![0x33; 8]]),
        ..ChunkWriterConfig::default()
    };
    let samples = vec![
        SampleSpec {
            duration: 333667,
            payload: vec![0xA0; 24],
        },
        SampleSpec {
            duration: 333666,
            payload: vec![0xB1; 16],
        },
        SampleSpec {
            duration: 333667,
            payload: vec![0xC2; 32],
        },
    ];

    let chunk = build_chunk(&config, &samples);
    println!("Generated chunk ({} bytes)", chunk.len());

    let mut parser = ChunkParser::new();
    parser.feed(&chunk);
    dump_chunk(&mut parser, "synthetic chunk");
}

fn dump_chunk(parser: &mut ChunkParser, source: &str) {
    match parser.parse_header() {
        Ok(true) => {}
        Ok(false) => {
            eprintln!("'{}' is incomplete: header needs more bytes", source);
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to parse '{}': {}", source, e);
            process::exit(1);
        }
    }

    println!(
        "Parsed '{}': sequence {:?}, {} sample(s), {:.3} fps\n",
        source,
        parser.sequence_number(),
        parser.sample_count(),
        parser.frame_rate()
    );

    let mut index = 0;
    loop {
        match parser.next_frame() {
            Ok(Some(frame)) => {
                println!(
                    "Frame {}: time {} offset {} len {} iv {}",
                    index,
                    frame.time,
                    frame.offset,
                    frame.data.len(),
                    frame
                        .iv
                        .as_ref()
                        .map(|iv| format!("{} byte(s)", iv.len()))
                        .unwrap_or_else(|| "-".to_string())
                );
                index += 1;
            }
            Ok(None) => break,
            Err(e) => {
                eprintln!("Frame extraction failed: {}", e);
                process::exit(1);
            }
        }
    }
    println!("\n{} frame(s) extracted", index);
}
