//! Block rows: owner-scoped CRUD and the ordering engine.
//!
//! Every statement filters on `owner_id`; a block owned by someone else
//! behaves exactly like a missing one.  Page order is `sort ASC, id ASC`.

use chrono::Utc;
use rusqlite::params;

use linkcard_shared::constants::DEFAULT_SORT_KEY;
use linkcard_shared::{
    Block, BlockFields, BlockId, BlockKind, BlockPayload, FieldUpdate, OwnerId, ReorderItem,
};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{conversion_error, parse_timestamp};

const BLOCK_COLUMNS: &str = "id, owner_id, kind, sort, text, link_url, photo_url, video_url, \
                             music_embed, map_lat, map_lng, social_kind, social_url, \
                             created_at, updated_at";

// Sparse update: each field is bound as (touched, value) so one fixed
// statement covers every combination.
const UPDATE_SQL: &str = "UPDATE blocks SET
    kind        = ?3,
    sort        = COALESCE(?4, sort),
    text        = CASE WHEN ?5  THEN ?6  ELSE text END,
    link_url    = CASE WHEN ?7  THEN ?8  ELSE link_url END,
    photo_url   = CASE WHEN ?9  THEN ?10 ELSE photo_url END,
    video_url   = CASE WHEN ?11 THEN ?12 ELSE video_url END,
    music_embed = CASE WHEN ?13 THEN ?14 ELSE music_embed END,
    map_lat     = CASE WHEN ?15 THEN ?16 ELSE map_lat END,
    map_lng     = CASE WHEN ?17 THEN ?18 ELSE map_lng END,
    social_kind = CASE WHEN ?19 THEN ?20 ELSE social_kind END,
    social_url  = CASE WHEN ?21 THEN ?22 ELSE social_url END,
    updated_at  = ?23
 WHERE id = ?1 AND owner_id = ?2";

// Coordinates are a pair; a half-set pair is cleared.
const UNPAIR_SQL: &str = "UPDATE blocks SET map_lat = NULL, map_lng = NULL
 WHERE id = ?1 AND (map_lat IS NULL) <> (map_lng IS NULL)";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a block of `kind` for `owner` with the normalized fields.
    ///
    /// Without an explicit sort the block gets [`DEFAULT_SORT_KEY`].
    pub fn insert_block(
        &self,
        owner: OwnerId,
        kind: BlockKind,
        update: &FieldUpdate,
    ) -> Result<Block> {
        let mut fields = BlockFields::default();
        update.apply_to(&mut fields);
        let payload = BlockPayload::from_fields(kind, fields);
        let f = payload.to_fields();

        let sort = update.sort.unwrap_or(DEFAULT_SORT_KEY);
        let now = Utc::now();

        self.conn().execute(
            "INSERT INTO blocks (owner_id, kind, sort, text, link_url, photo_url, video_url,
                                 music_embed, map_lat, map_lng, social_kind, social_url,
                                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
            params![
                owner.0,
                kind.as_str(),
                sort,
                f.text,
                f.link_url,
                f.photo_url,
                f.video_url,
                f.music_embed,
                f.map_lat,
                f.map_lng,
                f.social_kind.map(|k| k.as_str()),
                f.social_url,
                now.to_rfc3339(),
            ],
        )?;

        let id = BlockId(self.conn().last_insert_rowid());
        tracing::debug!(owner = %owner, block = %id, kind = %kind, sort, "block inserted");

        Ok(Block {
            id,
            owner_id: owner,
            sort,
            payload,
            created_at: now,
            updated_at: now,
        })
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch one block, scoped to its owner.
    pub fn get_block(&self, id: BlockId, owner: OwnerId) -> Result<Block> {
        self.conn()
            .query_row(
                &format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE id = ?1 AND owner_id = ?2"),
                params![id.0, owner.0],
                row_to_block,
            )
            .map_err(StoreError::from_query)
    }

    /// All of `owner`'s blocks in page order.
    pub fn list_blocks(&self, owner: OwnerId) -> Result<Vec<Block>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {BLOCK_COLUMNS}
             FROM blocks
             WHERE owner_id = ?1
             ORDER BY sort ASC, id ASC"
        ))?;

        let rows = stmt.query_map(params![owner.0], row_to_block)?;

        let mut blocks = Vec::new();
        for row in rows {
            blocks.push(row?);
        }
        Ok(blocks)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Set the block's type to `kind` and merge the touched fields.
    ///
    /// Untouched columns keep their values; `NotFound` if `owner` has no
    /// block `id`.
    pub fn update_block(
        &self,
        id: BlockId,
        owner: OwnerId,
        kind: BlockKind,
        update: &FieldUpdate,
    ) -> Result<Block> {
        let tx = self.conn().unchecked_transaction()?;

        let affected = tx.execute(
            UPDATE_SQL,
            params![
                id.0,
                owner.0,
                kind.as_str(),
                update.sort,
                update.text.is_some(),
                update.text.as_ref().and_then(Option::as_ref),
                update.link_url.is_some(),
                update.link_url.as_ref().and_then(Option::as_ref),
                update.photo_url.is_some(),
                update.photo_url.as_ref().and_then(Option::as_ref),
                update.video_url.is_some(),
                update.video_url.as_ref().and_then(Option::as_ref),
                update.music_embed.is_some(),
                update.music_embed.as_ref().and_then(Option::as_ref),
                update.map_lat.is_some(),
                update.map_lat.flatten(),
                update.map_lng.is_some(),
                update.map_lng.flatten(),
                update.social_kind.is_some(),
                update.social_kind.flatten().map(|k| k.as_str()),
                update.social_url.is_some(),
                update.social_url.as_ref().and_then(Option::as_ref),
                Utc::now().to_rfc3339(),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        tx.execute(UNPAIR_SQL, params![id.0])?;

        let block = tx
            .query_row(
                &format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE id = ?1 AND owner_id = ?2"),
                params![id.0, owner.0],
                row_to_block,
            )
            .map_err(StoreError::from_query)?;

        tx.commit()?;

        tracing::debug!(owner = %owner, block = %id, kind = %kind, "block updated");
        Ok(block)
    }

    /// Apply a batch of sort keys in one transaction.
    ///
    /// Items naming a block `owner` does not own (or that does not exist)
    /// are skipped.  Any storage error rolls the whole batch back.  Returns
    /// the number of blocks whose sort key was written.
    pub fn reorder_blocks(&self, owner: OwnerId, items: &[ReorderItem]) -> Result<usize> {
        let tx = self.conn().unchecked_transaction()?;
        let now = Utc::now().to_rfc3339();

        let mut applied = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE blocks SET sort = ?1, updated_at = ?2 WHERE id = ?3 AND owner_id = ?4",
            )?;
            for item in items {
                applied += stmt.execute(params![item.sort, now, item.id.0, owner.0])?;
            }
        }

        tx.commit()?;

        tracing::debug!(
            owner = %owner,
            requested = items.len(),
            applied,
            "blocks reordered"
        );
        Ok(applied)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a block if `owner` owns it.  Returns `true` if a row was deleted.
    pub fn delete_block(&self, id: BlockId, owner: OwnerId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM blocks WHERE id = ?1 AND owner_id = ?2",
            params![id.0, owner.0],
        )?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Block`].
fn row_to_block(row: &rusqlite::Row<'_>) -> rusqlite::Result<Block> {
    let kind_str: String = row.get(2)?;
    let social_str: Option<String> = row.get(11)?;
    let created_str: String = row.get(13)?;
    let updated_str: String = row.get(14)?;

    let kind: BlockKind = kind_str.parse().map_err(|e| conversion_error(2, e))?;
    let social_kind = social_str
        .map(|s| s.parse())
        .transpose()
        .map_err(|e| conversion_error(11, e))?;

    let fields = BlockFields {
        text: row.get(4)?,
        link_url: row.get(5)?,
        photo_url: row.get(6)?,
        video_url: row.get(7)?,
        music_embed: row.get(8)?,
        map_lat: row.get(9)?,
        map_lng: row.get(10)?,
        social_kind,
        social_url: row.get(12)?,
    };

    Ok(Block {
        id: BlockId(row.get(0)?),
        owner_id: OwnerId(row.get(1)?),
        sort: row.get(3)?,
        payload: BlockPayload::from_fields(kind, fields),
        created_at: parse_timestamp(13, &created_str)?,
        updated_at: parse_timestamp(14, &updated_str)?,
    })
}

#[cfg(test)]
mod tests {
    use linkcard_shared::{normalize, FieldName, UnifiedPatch};
    use serde_json::json;

    use super::*;
    use crate::database::test_support::temp_db;

    fn patch(value: serde_json::Value) -> UnifiedPatch {
        serde_json::from_value(value).unwrap()
    }

    fn owner(db: &Database, name: &str) -> OwnerId {
        db.create_account(name, "h").unwrap().0.id
    }

    fn raw_fields(db: &Database, id: BlockId) -> BlockFields {
        // Bypass payload conversion to see exactly what is stored.
        db.conn()
            .query_row(
                "SELECT text, link_url, photo_url, video_url, music_embed,
                        map_lat, map_lng, social_kind, social_url
                 FROM blocks WHERE id = ?1",
                params![id.0],
                |row| {
                    let social: Option<String> = row.get(7)?;
                    Ok(BlockFields {
                        text: row.get(0)?,
                        link_url: row.get(1)?,
                        photo_url: row.get(2)?,
                        video_url: row.get(3)?,
                        music_embed: row.get(4)?,
                        map_lat: row.get(5)?,
                        map_lng: row.get(6)?,
                        social_kind: social.and_then(|s| s.parse().ok()),
                        social_url: row.get(8)?,
                    })
                },
            )
            .unwrap()
    }

    #[test]
    fn test_insert_defaults_sort_to_zero() {
        let (db, _dir) = temp_db();
        let me = owner(&db, "alice");
        let update = normalize(BlockKind::Note, &patch(json!({"content": "hi"})));

        let block = db.insert_block(me, BlockKind::Note, &update).unwrap();
        assert_eq!(block.sort, 0);
        assert_eq!(
            block.payload,
            BlockPayload::Note {
                text: Some("hi".into())
            }
        );
        assert_eq!(db.get_block(block.id, me).unwrap().payload, block.payload);
    }

    #[test]
    fn test_list_orders_by_sort_then_id() {
        let (db, _dir) = temp_db();
        let me = owner(&db, "alice");
        let mk = |sort: i64| {
            let update = normalize(BlockKind::Note, &patch(json!({ "sort": sort })));
            db.insert_block(me, BlockKind::Note, &update).unwrap().id
        };
        let a = mk(5);
        let b = mk(1);
        let c = mk(5);
        let d = mk(1);

        for _ in 0..3 {
            let ids: Vec<_> = db.list_blocks(me).unwrap().iter().map(|b| b.id).collect();
            assert_eq!(ids, vec![b, d, a, c]);
        }
    }

    #[test]
    fn test_list_is_owner_scoped() {
        let (db, _dir) = temp_db();
        let alice = owner(&db, "alice");
        let bob = owner(&db, "bob");
        let update = normalize(BlockKind::Link, &patch(json!({"url": "u"})));
        db.insert_block(alice, BlockKind::Link, &update).unwrap();

        assert_eq!(db.list_blocks(alice).unwrap().len(), 1);
        assert!(db.list_blocks(bob).unwrap().is_empty());
    }

    #[test]
    fn test_update_is_sparse() {
        let (db, _dir) = temp_db();
        let me = owner(&db, "alice");
        let created = normalize(BlockKind::Link, &patch(json!({"url": "https://a", "sort": 3})));
        let block = db.insert_block(me, BlockKind::Link, &created).unwrap();

        let only_sort = normalize(BlockKind::Link, &patch(json!({"sort": 9})));
        let updated = db.update_block(block.id, me, BlockKind::Link, &only_sort).unwrap();

        assert_eq!(updated.sort, 9);
        assert_eq!(
            updated.payload,
            BlockPayload::Link {
                url: Some("https://a".into())
            }
        );
        assert!(updated.updated_at >= block.updated_at);
    }

    #[test]
    fn test_retype_clears_foreign_columns() {
        let (db, _dir) = temp_db();
        let me = owner(&db, "alice");
        let created = normalize(BlockKind::Note, &patch(json!({"content": "hi"})));
        let block = db.insert_block(me, BlockKind::Note, &created).unwrap();

        let retype = normalize(BlockKind::Map, &patch(json!({"url": "55.75, 37.61"})));
        let updated = db.update_block(block.id, me, BlockKind::Map, &retype).unwrap();

        assert_eq!(updated.kind(), BlockKind::Map);
        let stored = raw_fields(&db, block.id);
        assert_eq!(
            stored.set_fields(),
            vec![FieldName::MapLat, FieldName::MapLng]
        );
        assert_eq!(stored.map_lat, Some(55.75));
    }

    #[test]
    fn test_half_coordinate_pair_is_cleared_in_storage() {
        let (db, _dir) = temp_db();
        let me = owner(&db, "alice");
        let created = normalize(BlockKind::Map, &patch(json!({"url": "1,2"})));
        let block = db.insert_block(me, BlockKind::Map, &created).unwrap();

        let half = normalize(BlockKind::Map, &patch(json!({"mapLng": "bad"})));
        db.update_block(block.id, me, BlockKind::Map, &half).unwrap();

        assert_eq!(raw_fields(&db, block.id), BlockFields::default());
    }

    #[test]
    fn test_update_foreign_block_is_not_found_and_untouched() {
        let (db, _dir) = temp_db();
        let alice = owner(&db, "alice");
        let mallory = owner(&db, "mallory");
        let created = normalize(BlockKind::Note, &patch(json!({"content": "mine"})));
        let block = db.insert_block(alice, BlockKind::Note, &created).unwrap();

        let attack = normalize(BlockKind::Note, &patch(json!({"content": "pwned", "sort": 99})));
        let err = db
            .update_block(block.id, mallory, BlockKind::Note, &attack)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));

        assert_eq!(db.get_block(block.id, alice).unwrap(), block);
    }

    #[test]
    fn test_reorder_skips_foreign_and_missing_ids() {
        let (db, _dir) = temp_db();
        let alice = owner(&db, "alice");
        let bob = owner(&db, "bob");
        let note = normalize(BlockKind::Note, &UnifiedPatch::default());
        let a1 = db.insert_block(alice, BlockKind::Note, &note).unwrap().id;
        let a2 = db.insert_block(alice, BlockKind::Note, &note).unwrap().id;
        let b1 = db.insert_block(bob, BlockKind::Note, &note).unwrap().id;

        let applied = db
            .reorder_blocks(
                alice,
                &[
                    ReorderItem { id: a1, sort: 2 },
                    ReorderItem { id: b1, sort: 7 },
                    ReorderItem { id: BlockId(9999), sort: 0 },
                    ReorderItem { id: a2, sort: 1 },
                ],
            )
            .unwrap();

        assert_eq!(applied, 2);
        let ids: Vec<_> = db.list_blocks(alice).unwrap().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![a2, a1]);
        assert_eq!(db.get_block(b1, bob).unwrap().sort, 0);
    }

    #[test]
    fn test_reorder_rolls_back_on_storage_error() {
        let (db, _dir) = temp_db();
        let me = owner(&db, "alice");
        let note = normalize(BlockKind::Note, &UnifiedPatch::default());
        let a = db.insert_block(me, BlockKind::Note, &note).unwrap().id;
        let b = db.insert_block(me, BlockKind::Note, &note).unwrap().id;

        // Make the second write fail mid-batch.
        db.conn()
            .execute_batch(&format!(
                "CREATE TRIGGER fail_on_b BEFORE UPDATE OF sort ON blocks
                 WHEN NEW.id = {b}
                 BEGIN SELECT RAISE(ABORT, 'boom'); END;"
            ))
            .unwrap();

        let result = db.reorder_blocks(
            me,
            &[ReorderItem { id: a, sort: 10 }, ReorderItem { id: b, sort: 20 }],
        );
        assert!(result.is_err());
        assert_eq!(db.get_block(a, me).unwrap().sort, 0);
        assert_eq!(db.get_block(b, me).unwrap().sort, 0);
    }

    #[test]
    fn test_delete_is_owner_scoped_and_idempotent() {
        let (db, _dir) = temp_db();
        let alice = owner(&db, "alice");
        let bob = owner(&db, "bob");
        let note = normalize(BlockKind::Note, &UnifiedPatch::default());
        let id = db.insert_block(alice, BlockKind::Note, &note).unwrap().id;

        assert!(!db.delete_block(id, bob).unwrap());
        assert!(db.delete_block(id, alice).unwrap());
        assert!(!db.delete_block(id, alice).unwrap());
        assert!(matches!(db.get_block(id, alice), Err(StoreError::NotFound)));
    }
}
