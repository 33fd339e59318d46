use rockscache::{CacheBuilder, Consistency};
use std::collections::HashMap;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  let version = Arc::new(AtomicUsize::new(1));
  let loads = Arc::new(AtomicUsize::new(0));

  let cache = CacheBuilder::<String, String>::json()
    .key_prefix("profile:")
    .fresh_ttl(Duration::from_secs(30))
    .async_loader({
      let version = version.clone();
      let loads = loads.clone();
      move |keys: Vec<String>| {
        let version = version.clone();
        let loads = loads.clone();
        async move {
          loads.fetch_add(1, Ordering::SeqCst);
          println!("[Loader] Loading {:?}...", keys);
          tokio::time::sleep(Duration::from_millis(300)).await;
          let v = version.load(Ordering::SeqCst);
          Ok(
            keys
              .into_iter()
              .map(|k| {
                let value = format!("{k} v{v}");
                (k, value)
              })
              .collect::<HashMap<_, _>>(),
          )
        }
      }
    })
    .build()?;

  let key = "alice".to_string();

  println!("--- Step 1: Initial Load ---");
  println!("Received: {:?}", cache.fetch(key.clone()).await?);

  println!("\n--- Step 2: Write to the source, then tag the key ---");
  version.store(2, Ordering::SeqCst);
  cache.tag_as_deleted(key.clone()).await?;

  println!("\n--- Step 3: Eventual read serves the old value immediately ---");
  println!("Received: {:?}", cache.fetch(key.clone()).await?);

  println!("\n--- Step 4: Wait for the background refresh ---");
  tokio::time::sleep(Duration::from_millis(500)).await;
  println!("Received: {:?}", cache.fetch(key.clone()).await?);

  println!("\n--- Step 5: Strong read after another write ---");
  version.store(3, Ordering::SeqCst);
  cache.tag_as_deleted(key.clone()).await?;
  let strong = cache.with_consistency(Consistency::Strong);
  println!("Received: {:?}", strong.fetch(key).await?);

  println!("\nLoader calls: {}", loads.load(Ordering::SeqCst));
  println!("{:#?}", cache.metrics());
  Ok(())
}
