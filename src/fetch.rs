use crate::config::Config;
use crate::error::Result;
use reqwest::blocking::Client;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Overpass query for every way tagged `bridge` inside Germany, except the
/// `man_made=bridge` outlines, printed with geometry and bounds.
pub const OVERPASS_QUERY: &str = concat!(
    r#"<osm-script timeout="6000">"#,
    r#"<query into="_" type="area">"#,
    r#"<has-kv k="name" modv="" v="Deutschland"/>"#,
    r#"</query>"#,
    r#"<query into="_" type="way">"#,
    r#"<has-kv k="bridge" modv="" v=""/>"#,
    r#"<has-kv k="man_made" modv="not" v="bridge"/>"#,
    r#"<area-query/>"#,
    r#"</query>"#,
    r#"<print e="" from="_" geometry="full" ids="yes" limit="" mode="body" n="" order="id" s="" w=""/>"#,
    r#"</osm-script>"#,
);

fn client(config: &Config) -> Result<Client> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?;
    Ok(client)
}

/// Runs the Overpass query and stores the raw XML answer.
pub fn fetch_osm(config: &Config) -> Result<()> {
    let target = config.osm_document();
    log::info!("Querying {} for bridge ways...", config.overpass_url);

    let response = client(config)?
        .post(&config.overpass_url)
        .body(OVERPASS_QUERY)
        .send()?
        .error_for_status()?;
    let body = response.bytes()?;

    write_raw(&target, &body)?;
    log::info!("Wrote {} bytes to {}", body.len(), target.display());
    Ok(())
}

/// Returns the raw BASt table, downloading it only if no cached copy exists.
pub fn fetch_bast(config: &Config) -> Result<Vec<u8>> {
    let cached = config.bast_raw();
    if cached.exists() {
        log::info!("Using cached BASt table {}", cached.display());
        return Ok(fs::read(&cached)?);
    }

    log::info!("Downloading BASt bridge statistics from {}...", config.bast_url);
    let response = client(config)?
        .get(&config.bast_url)
        .send()?
        .error_for_status()?;
    let body = response.bytes()?.to_vec();

    write_raw(&cached, &body)?;
    log::info!("Cached {} bytes to {}", body.len(), cached.display());
    Ok(body)
}

fn write_raw(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn cached_bast_table_skips_download() {
        let dir = tempdir().unwrap();
        let mut config = Config::with_data_dir(dir.path());
        config.bast_url = "http://127.0.0.1:9/unreachable.csv".to_string();
        fs::write(config.bast_raw(), b"bwnr;tbwnr\n").unwrap();

        let bytes = fetch_bast(&config).unwrap();
        assert_eq!(bytes, b"bwnr;tbwnr\n");
    }

    #[test]
    fn query_targets_bridge_ways_with_bounds() {
        assert!(OVERPASS_QUERY.contains(r#"<has-kv k="bridge" modv="" v=""/>"#));
        assert!(OVERPASS_QUERY.contains(r#"geometry="full""#));
    }
}
