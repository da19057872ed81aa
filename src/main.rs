//! Demo driver: builds a small tree key by key, printing the structure
//! after every mutation, then deletes a handful of keys the same way.
//!
//! ```bash
//! cargo run
//! # with structural event logging:
//! RUST_LOG=bytetree=debug cargo run --features tracing
//! ```

use bytetree::BTree;

const INSERT_KEYS: [&str; 18] = [
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "Z", "U", "T", "P", "S", "R", "W", "X", "Y",
];

const DELETE_KEYS: [&str; 5] = ["T", "P", "B", "C", "F"];

fn print_structure(tree: &BTree) {
    println!("=== BTree structure ===");
    print!("{}", tree.dump_structure());
    println!("========================");
}

#[cfg(feature = "tracing")]
fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

fn main() {
    #[cfg(feature = "tracing")]
    init_tracing();

    println!("=== DEMO: B-tree index ===");

    let tree = BTree::new();

    for key in INSERT_KEYS {
        tree.upsert(key.as_bytes(), format!("val_{key}").as_bytes());
        println!("\nadded key: {key}");
        print_structure(&tree);
    }

    println!("\ndeleting keys:");
    for key in DELETE_KEYS {
        tree.delete(key.as_bytes());
        println!("\nremoved: {key}");
        print_structure(&tree);
    }

    println!("\n{} keys remain", tree.len());
    tree.assert_invariants();
    println!("=== END OF DEMO ===");
}
