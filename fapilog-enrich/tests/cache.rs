use std::time::Duration;

use fapilog_enrich::EnricherCache;

#[test]
fn hit_then_expiry() {
    let cache: EnricherCache<&str, &str> = EnricherCache::new(Duration::from_millis(30), 10);
    cache.insert("k", "v");
    assert_eq!(cache.get(&"k"), Some("v"));
    std::thread::sleep(Duration::from_millis(40));
    assert_eq!(cache.get(&"k"), None);
}

#[test]
fn evicts_oldest_when_full() {
    let cache: EnricherCache<i32, i32> = EnricherCache::new(Duration::from_secs(60), 2);
    cache.insert(1, 1);
    cache.insert(2, 2);
    cache.insert(3, 3);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(&1), None);
    assert_eq!(cache.get(&3), Some(3));
}
