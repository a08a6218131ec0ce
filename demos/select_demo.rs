// Walkthrough of the where/select projection engine
//
// Each section prints the template's effect on a small dataset:
// - Copy and rename
// - Literals and computed fields
// - Nested projection
// - Spreads
// - Chaining and null propagation
//
// Set RUST_LOG=whereselect=trace to see the engine's trace output.

use serde_json::json;
use tracing_subscriber::EnvFilter;
use whereselect::{compute, from, try_compute, JValue, Template, __, shape};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== where/select Demo ===\n");

    let data: JValue = json!([
        {
            "name": "John",
            "lastName": "Doe",
            "dob": "1972-09-20",
            "friends": [{"name": "Jane", "lastName": "Doe"}]
        },
        {
            "name": "Jane",
            "lastName": "Doe",
            "dob": "1976-02-27",
            "friends": [{"name": "John", "lastName": "Doe"}]
        }
    ])
    .into();

    demo_copy_and_rename(&data);
    demo_literals_and_compute(&data);
    demo_nested(&data);
    demo_spreads(&data);
    demo_chaining(&data);
}

fn show(title: &str, result: whereselect::Result<JValue>) {
    match result {
        Ok(v) => println!(
            "{}:\n{}\n",
            title,
            v.to_json_string_pretty().unwrap_or_else(|e| e.to_string())
        ),
        Err(e) => println!("{}: error: {}\n", title, e),
    }
}

fn demo_copy_and_rename(data: &JValue) {
    println!("--- Copy and rename ---");
    show(
        "name + surname",
        from(data.clone()).select(&shape! {
            "name" => __,
            "surname" => __.field("lastName"),
            "nickname" => __.field("nickname"),
        }),
    );
}

fn demo_literals_and_compute(data: &JValue) {
    println!("--- Literals and computed fields ---");
    show(
        "literal and compute",
        from(data.clone()).select(&shape! {
            "label" => "name",
            "full" => compute(|r| {
                format!(
                    "{} {}",
                    r.field("name").as_str().unwrap_or_default(),
                    r.field("lastName").as_str().unwrap_or_default()
                )
            }),
        }),
    );
}

fn demo_nested(data: &JValue) {
    println!("--- Nested projection ---");
    show(
        "friends' names",
        from(data.clone()).select(&shape! {
            "name" => __,
            "friends" => shape! { "name" => __ },
        }),
    );
}

fn demo_spreads(data: &JValue) {
    println!("--- Spreads ---");
    show(
        "spread all, override dob",
        from(data.clone()).select(&Template::new().spread_all().field("dob", "hidden")),
    );
    show(
        "spread some",
        from(data.clone()).select(
            &Template::new()
                .spread_some(shape! { "name" => __, "lastName" => __ })
                .field("source", "demo"),
        ),
    );
}

fn demo_chaining(data: &JValue) {
    println!("--- Chaining ---");
    let everyone = data.clone();
    show(
        "John with friends looked up",
        from(data.clone())
            .matching(json!({"name": "John"}))
            .select(&shape! {
                "name" => __,
                "friendsByLookup" => try_compute(move |_| {
                    from(everyone.clone())
                        .filter(|p| p.field("name").as_str() != Some("John"))
                        .select(&shape! { "name" => __ })
                }),
            }),
    );
    show(
        "null source",
        from(JValue::Null)
            .matching(json!({"name": "John"}))
            .select(&shape! { "name" => __ }),
    );
}
