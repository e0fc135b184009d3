use sqlx::{Executor, Sqlite};

use crate::{
	Result,
	db::NodeStore,
	models::{Node, NodeLookup},
	schema,
};

pub async fn put(store: &NodeStore, node: &Node, collection: &str) -> Result<()> {
	put_all(store, std::slice::from_ref(node), collection).await
}

/// Upserts every node in one transaction.
pub async fn put_all(store: &NodeStore, nodes: &[Node], collection: &str) -> Result<()> {
	let table = schema::table_name(collection)?;
	let encoded = nodes
		.iter()
		.map(|node| -> Result<(String, String)> {
			Ok((node.id.clone(), serde_json::to_string(node)?))
		})
		.collect::<Result<Vec<_>>>()?;
	let insert_sql = format!("INSERT OR REPLACE INTO [{table}] (key, value) VALUES (?1, ?2)");
	let _guard = store.writer.lock().await;
	let mut tx = store.pool.begin().await?;

	sqlx::query(schema::render_create_table(&table).as_str()).execute(&mut *tx).await?;

	for (key, value) in &encoded {
		sqlx::query(insert_sql.as_str())
			.bind(key.as_str())
			.bind(value.as_str())
			.execute(&mut *tx)
			.await?;
	}

	tx.commit().await?;

	Ok(())
}

/// Looks up one node. Absence, including an unknown collection, is `NodeLookup::NotFound`.
pub async fn get(store: &NodeStore, id: &str, collection: &str) -> Result<NodeLookup> {
	let table = schema::table_name(collection)?;

	if !table_exists(&store.pool, &table).await? {
		return Ok(NodeLookup::NotFound);
	}

	let select_sql = format!("SELECT value FROM [{table}] WHERE key = ?1");
	let row: Option<(String,)> =
		sqlx::query_as(select_sql.as_str()).bind(id).fetch_optional(&store.pool).await?;
	let Some((raw,)) = row else {
		return Ok(NodeLookup::NotFound);
	};

	Ok(decode_node(&raw))
}

/// Every record of a collection in key order. A damaged record is reported as
/// `NodeLookup::Corrupt` under its key and does not stop the scan.
pub async fn get_all(store: &NodeStore, collection: &str) -> Result<Vec<(String, NodeLookup)>> {
	let table = schema::table_name(collection)?;

	if !table_exists(&store.pool, &table).await? {
		return Ok(Vec::new());
	}

	let select_sql = format!("SELECT key, value FROM [{table}] ORDER BY key");
	let rows: Vec<(String, String)> =
		sqlx::query_as(select_sql.as_str()).fetch_all(&store.pool).await?;

	Ok(rows.into_iter().map(|(key, raw)| (key, decode_node(&raw))).collect())
}

pub async fn delete(store: &NodeStore, id: &str, collection: &str) -> Result<bool> {
	let table = schema::table_name(collection)?;
	let _guard = store.writer.lock().await;

	if !table_exists(&store.pool, &table).await? {
		return Ok(false);
	}

	let delete_sql = format!("DELETE FROM [{table}] WHERE key = ?1");
	let result = sqlx::query(delete_sql.as_str()).bind(id).execute(&store.pool).await?;

	Ok(result.rows_affected() > 0)
}

pub async fn count(store: &NodeStore, collection: &str) -> Result<u64> {
	let table = schema::table_name(collection)?;

	if !table_exists(&store.pool, &table).await? {
		return Ok(0);
	}

	let count_sql = format!("SELECT COUNT(*) FROM [{table}]");
	let count: i64 = sqlx::query_scalar(count_sql.as_str()).fetch_one(&store.pool).await?;

	Ok(count.max(0) as u64)
}

pub fn decode_node(raw: &str) -> NodeLookup {
	match serde_json::from_str::<Node>(raw) {
		Ok(node) => NodeLookup::Found(node),
		Err(err) => NodeLookup::Corrupt { reason: err.to_string() },
	}
}

async fn table_exists<'e, E>(executor: E, table: &str) -> Result<bool>
where
	E: Executor<'e, Database = Sqlite>,
{
	let found: Option<String> =
		sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1")
			.bind(table)
			.fetch_optional(executor)
			.await?;

	Ok(found.is_some())
}
