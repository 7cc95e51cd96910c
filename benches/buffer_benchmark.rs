// Scroll buffer benchmark: bulk append, chunked shell output, search, memory
use std::time::Instant;

use termpilot::session::{ScrollBuffer, SearchOptions, TerminalLine};

fn main() {
    println!("=== termpilot Scroll Buffer Benchmark ===\n");

    benchmark_line_append();
    benchmark_chunked_output();
    benchmark_search();
    benchmark_memory_usage();

    println!("=== Benchmark Complete ===");
}

fn log_line(i: usize) -> String {
    format!(
        "[{:06}] 2024-01-15 12:34:56.{:03} INFO  worker::exec - finished job #{} in {}ms",
        i,
        i % 1000,
        i,
        i % 97
    )
}

fn benchmark_line_append() {
    println!("Test 1: Line append (1M lines into a 100K ring)");

    let buffer = ScrollBuffer::with_capacity(100_000);
    let line_count = 1_000_000;
    let start = Instant::now();

    for i in 0..line_count {
        buffer.append(TerminalLine::new(log_line(i)));

        if i > 0 && i % 250_000 == 0 {
            let elapsed = start.elapsed();
            println!(
                "  ├─ {:>7} lines: {:>6.2}s ({:>6.1}K lines/sec)",
                i,
                elapsed.as_secs_f64(),
                (i as f64 / elapsed.as_secs_f64()) / 1000.0
            );
        }
    }

    let elapsed = start.elapsed();
    let stats = buffer.stats();
    println!(
        "  └─ Total: {:.2}s, kept {} of {} lines, {:.1} MB\n",
        elapsed.as_secs_f64(),
        stats.current_lines,
        stats.total_lines,
        stats.memory_usage_mb
    );
}

/// Raw output arrives in arbitrary chunks with colour codes; lines straddle
/// chunk boundaries.
fn benchmark_chunked_output() {
    println!("Test 2: Chunked ANSI output");

    let mut stream = String::new();
    for i in 0..200_000 {
        if i % 10 == 0 {
            stream.push_str(&format!("\x1b[31mERROR\x1b[0m job {} failed\r\n", i));
        } else {
            stream.push_str(&format!("\x1b[32mok\x1b[0m job {}\r\n", i));
        }
    }

    for chunk_size in [64usize, 1024, 16 * 1024] {
        let buffer = ScrollBuffer::with_capacity(200_000);
        let bytes = stream.as_bytes();
        let start = Instant::now();

        let mut offset = 0;
        while offset < bytes.len() {
            let mut end = (offset + chunk_size).min(bytes.len());
            while !stream.is_char_boundary(end) {
                end += 1;
            }
            buffer.append_output(&stream[offset..end]);
            offset = end;
        }

        let elapsed = start.elapsed();
        println!(
            "  ├─ {:>5}-byte chunks: {:.3}s ({:.1} MB/s), {} lines",
            chunk_size,
            elapsed.as_secs_f64(),
            (bytes.len() as f64 / (1024.0 * 1024.0)) / elapsed.as_secs_f64(),
            buffer.len()
        );
    }
    println!();
}

fn benchmark_search() {
    println!("Test 3: Search (1M lines)");

    let buffer = ScrollBuffer::with_capacity(1_000_000);
    for i in 0..1_000_000 {
        let text = if i % 100 == 0 {
            format!("ERROR: Connection timeout at line {}", i)
        } else if i % 50 == 0 {
            format!("WARNING: Slow query detected at line {}", i)
        } else {
            format!("[{}] Regular log line with some data", i)
        };
        buffer.append(TerminalLine::new(text));
    }
    let stats = buffer.stats();

    let cases = vec![
        (
            "Literal, high frequency, capped",
            SearchOptions {
                case_sensitive: true,
                ..SearchOptions::literal("line")
            },
        ),
        (
            "Literal, high frequency, uncapped",
            SearchOptions {
                case_sensitive: true,
                max_matches: 0,
                ..SearchOptions::literal("line")
            },
        ),
        (
            "Case insensitive",
            SearchOptions::literal("error"),
        ),
        (
            "Regex",
            SearchOptions {
                case_sensitive: true,
                regex: true,
                ..SearchOptions::literal(r"^(ERROR|WARNING):")
            },
        ),
        (
            "Whole word",
            SearchOptions {
                case_sensitive: true,
                whole_word: true,
                ..SearchOptions::literal("timeout")
            },
        ),
    ];

    for (name, options) in cases {
        let start = Instant::now();
        let result = buffer.search(&options);
        let elapsed = start.elapsed();

        println!("  ├─ {}", name);
        println!(
            "  │  Matches: {} (returned {}), Time: {:.3}s ({:.1}K lines/sec)",
            result.total_matches,
            result.matches.len(),
            elapsed.as_secs_f64(),
            (stats.current_lines as f64 / elapsed.as_secs_f64()) / 1000.0
        );
    }
    println!();
}

fn benchmark_memory_usage() {
    println!("Test 4: Memory usage");

    for (size, label) in [
        (10_000, "10K lines"),
        (100_000, "100K lines"),
        (1_000_000, "1M lines"),
    ] {
        let buffer = ScrollBuffer::with_capacity(size);
        for i in 0..size {
            buffer.append(TerminalLine::new(format!("[{:06}] Log line with some data payload #{}", i, i)));
        }

        let stats = buffer.stats();
        let bytes_per_line = (stats.memory_usage_mb * 1024.0 * 1024.0) / stats.current_lines as f64;
        println!(
            "  ├─ {}: {:.2} MB ({:.1} bytes/line)",
            label, stats.memory_usage_mb, bytes_per_line
        );
    }
    println!();
}
