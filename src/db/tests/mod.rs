use crate::db::Database;
use crate::types::GroupName;
use tempfile::NamedTempFile;

mod close;
mod transactions;

/// Fresh database with one empty group
async fn db_with_group(name: &str) -> (NamedTempFile, Database, GroupName) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    let group = GroupName::parse(name).unwrap();
    db.create_group(&group).await.unwrap();
    (temp_file, db, group)
}
