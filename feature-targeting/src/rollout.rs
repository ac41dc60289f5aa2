/// This function takes a bucketing key and returns an integer between 0
/// and 99. Given the same key it always returns the same bucket, and the
/// buckets are spread evenly enough that comparing against a rollout
/// percentage gates roughly that share of traffic.
///
/// The bucket depends on nothing but the key: raising the configured
/// percentage only ever adds previously-excluded keys and lowering it only
/// ever removes previously-included ones. Any change that reshuffles
/// existing assignments breaks the product's "never flip someone back off"
/// guarantee and must be treated as a regression.
pub fn bucket(key: &str) -> u32 {
    let mut hash: u32 = 0;
    for unit in key.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(u32::from(unit));
    }
    hash % 100
}
