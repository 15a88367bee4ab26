use super::connect_client;
use cloudrig_core::{KeyValueTags, update_tags};
use colored::Colorize;
use std::collections::BTreeMap;

/// Parse `KEY=VALUE` pairs.
pub fn parse_assignments(pairs: &[String]) -> anyhow::Result<BTreeMap<String, String>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(anyhow::anyhow!("invalid tag {pair:?}, expected KEY=VALUE")),
        })
        .collect()
}

pub async fn handle(arn: &str, set: &[String], remove: &[String]) -> anyhow::Result<()> {
    let assignments = parse_assignments(set)?;
    let client = connect_client(None).await?;
    let service = cloudrig_aws::tag_service_for_arn(&client, arn)?;

    let current = service.list_tags(arn).await?;

    if !assignments.is_empty() || !remove.is_empty() {
        let mut desired = current.map();
        desired.extend(assignments);
        for key in remove {
            desired.remove(key);
        }
        let desired = KeyValueTags::from(desired);

        update_tags(service.as_ref(), arn, &current, &desired).await?;
        println!("{} tags updated", "✓".green());
        print_tags(&service.list_tags(arn).await?);
        return Ok(());
    }

    print_tags(&current);
    Ok(())
}

fn print_tags(tags: &KeyValueTags) {
    if tags.is_empty() {
        println!("{}", "No tags".dimmed());
        return;
    }
    for (key, value) in tags.iter() {
        println!("  {} = {}", key.cyan(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignments() {
        let parsed =
            parse_assignments(&["Owner=platform".to_string(), "Empty=".to_string()]).unwrap();
        assert_eq!(parsed["Owner"], "platform");
        assert_eq!(parsed["Empty"], "");

        assert!(parse_assignments(&["novalue".to_string()]).is_err());
        assert!(parse_assignments(&["=value".to_string()]).is_err());
    }
}
