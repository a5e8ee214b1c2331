use std::time::{Duration, Instant};

use cordyceps_rbtree::{Error, RbMap};
use log::{error, info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

const ITEMS_TO_STORE: &[u8] = b"CDAB";
const INVALID_ITEM: u8 = b'@';
const BULK_ITEMS: u32 = 1_000_000;

/// Accumulates elapsed wall-clock time across start/stop intervals.
#[derive(Default)]
struct Stopwatch {
    started: Option<Instant>,
    elapsed: Duration,
}

impl Stopwatch {
    fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.elapsed += started.elapsed();
        }
    }

    fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

fn insert_items(map: &mut RbMap<u8, usize>) -> Result<(), Error> {
    for (index, &item) in ITEMS_TO_STORE.iter().enumerate() {
        map.insert(item, index).inspect_err(|err| {
            error!("inserting item {index} ({}): {err}", char::from(item));
        })?;
    }

    Ok(())
}

fn find_item(map: &RbMap<u8, usize>, item: u8) -> bool {
    match map.get(&item) {
        Some(index) => {
            println!("The item {} has been found at index {index}", char::from(item));
            true
        }
        None => {
            println!("The item {} was not found", char::from(item));
            false
        }
    }
}

fn bulk_insert(count: u32) {
    let mut map = RbMap::new();
    let mut stopwatch = Stopwatch::default();

    stopwatch.start();
    for i in 0..count {
        // Fibonacci hashing spreads sequential indices over the key space.
        let key = i.wrapping_mul(0x9e37_79b9);
        if map.insert(key, i).is_err() {
            error!("duplicate bulk key {key:#x}");
        }
    }
    stopwatch.stop();

    println!(
        "Inserted {} items in {:.3}s (height {}, exact height {})",
        map.len(),
        stopwatch.elapsed_secs(),
        map.height(),
        map.exact_height(),
    );

    let mut released = 0usize;
    stopwatch.start();
    map.destroy(|_, _| released += 1);
    stopwatch.stop();

    info!("released {released} items, total {:.3}s", stopwatch.elapsed_secs());
}

fn main() {
    if let Err(err) = TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        eprintln!("failed to initialize logging: {err}");
    }

    let mut map = RbMap::new();

    if insert_items(&mut map).is_ok() {
        println!("{}", map.construct_visual());

        if !find_item(&map, ITEMS_TO_STORE[1]) {
            error!("looking for a valid item has failed");
        }

        if find_item(&map, INVALID_ITEM) {
            error!("found an item that is not there");
        }
    }

    map.destroy(|key, index| info!("released {} (index {index})", char::from(key)));

    bulk_insert(BULK_ITEMS);
}
