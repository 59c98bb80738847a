/// Format a timestamp for use in filenames (snapshot tags, §4.1).
pub fn snapshot_tag(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}
