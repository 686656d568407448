// borevault/src/commands/records.rs

use anyhow::bail;
use borevault_core::domain::record::{EntityType, RecordAddress, RecordStatus};

use super::open_repository;

fn parse_address(
    project_id: &str,
    entity_type: &str,
    entity_id: &str,
) -> anyhow::Result<RecordAddress> {
    let entity_type = EntityType::parse(entity_type)?;
    Ok(RecordAddress::new(project_id, entity_type, entity_id))
}

pub async fn list(
    project_id: &str,
    entity_type: &str,
    status: Option<&str>,
) -> anyhow::Result<()> {
    let repository = open_repository().await?;
    let entity_type = EntityType::parse(entity_type)?;
    let status = match status {
        None => None,
        Some(raw) => match RecordStatus::parse(raw) {
            Some(status) => Some(status),
            None => bail!("unknown status '{raw}' (expected draft, approved or rejected)"),
        },
    };

    let records = repository
        .list_by_project(entity_type, project_id, status)
        .await?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    eprintln!("📋 {} record(s)", records.len());
    Ok(())
}

pub async fn get(
    project_id: &str,
    entity_type: &str,
    entity_id: &str,
    version: Option<u32>,
) -> anyhow::Result<()> {
    let repository = open_repository().await?;
    let address = parse_address(project_id, entity_type, entity_id)?;

    let record = match version {
        Some(v) => repository.get_version(&address, v).await?,
        None => repository.get_latest(&address).await?,
    };
    match record {
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        None => bail!("record {} not found", address.record_id()),
    }
}

pub async fn history(
    project_id: &str,
    entity_type: &str,
    entity_id: &str,
) -> anyhow::Result<()> {
    let repository = open_repository().await?;
    let address = parse_address(project_id, entity_type, entity_id)?;

    match repository.get_history(&address).await? {
        Some(history) => {
            println!("{}", serde_json::to_string_pretty(&history)?);
            Ok(())
        }
        None => bail!("record {} not found", address.record_id()),
    }
}

pub async fn approve(
    project_id: &str,
    entity_type: &str,
    entity_id: &str,
    user: &str,
    comment: Option<&str>,
) -> anyhow::Result<()> {
    let repository = open_repository().await?;
    let address = parse_address(project_id, entity_type, entity_id)?;

    let record = repository.approve(&address, user, comment).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    eprintln!("✅ approved {}", address.record_id());
    Ok(())
}

pub async fn reject(
    project_id: &str,
    entity_type: &str,
    entity_id: &str,
    user: &str,
    comment: Option<&str>,
) -> anyhow::Result<()> {
    let repository = open_repository().await?;
    let address = parse_address(project_id, entity_type, entity_id)?;

    let record = repository.reject(&address, user, comment).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    eprintln!("🚫 rejected {}", address.record_id());
    Ok(())
}
