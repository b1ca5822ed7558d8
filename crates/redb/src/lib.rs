mod tables;

use redb::{Database, ReadTransaction, WriteTransaction};
use std::path::Path;
use std::sync::Arc;

use argus_core::pattern::{AssetNamePattern, OutputIndexPattern, Pattern};
use argus_core::point::{BlockSlot, Point};
use argus_core::result::{BinaryData, Input, OutputReference, Script};
use argus_core::store::{BlockApply, InputManagement, SortDirection, StatusFlag, Store, StoreError};

use tables::{
    BINARY_DATA, CHECKPOINTS, INPUTS, INPUTS_BY_ADDRESS, INPUTS_BY_POLICY, INPUTS_BY_SLOT,
    INPUTS_BY_TXID, PATTERNS, SCRIPTS,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Database(#[from] redb::DatabaseError),
    #[error(transparent)]
    Transaction(#[from] redb::TransactionError),
    #[error(transparent)]
    Table(#[from] redb::TableError),
    #[error(transparent)]
    Storage(#[from] redb::StorageError),
    #[error(transparent)]
    Commit(#[from] redb::CommitError),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<Error> for StoreError {
    fn from(error: Error) -> Self {
        StoreError::Io(error.to_string())
    }
}

fn outref_key(tx_id: &[u8], index: u32) -> Vec<u8> {
    let mut key = tx_id.to_vec();
    key.extend_from_slice(&index.to_be_bytes());
    key
}

fn decode_input(bytes: &[u8]) -> Result<Input, Error> {
    bincode::deserialize(bytes).map_err(|e| Error::Decode(e.to_string()))
}

fn encode_input(input: &Input) -> Result<Vec<u8>, Error> {
    bincode::serialize(input).map_err(|e| Error::Decode(e.to_string()))
}

/// Embedded `redb`-backed implementation of the store. All synchronous
/// `redb` work runs inside `spawn_blocking`, mirroring the teacher's
/// blocking-pool pattern for store access from async handlers.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let db = Database::create(path)?;
        let mut wx = db.begin_write()?;
        for table in tables::all() {
            table.initialize(&mut wx)?;
        }
        wx.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    fn begin_read(&self) -> Result<ReadTransaction, Error> {
        Ok(self.db.begin_read()?)
    }

    fn begin_write(&self) -> Result<WriteTransaction, Error> {
        Ok(self.db.begin_write()?)
    }

    fn input_matches(pattern: &Pattern, input: &Input) -> bool {
        if matches!(pattern, Pattern::Any) {
            return true;
        }
        match pattern {
            Pattern::Address(_) => {
                match pallas::ledger::addresses::Address::from_bytes(&input.address) {
                    Ok(address) => pattern.matches_address(&address),
                    Err(_) => false,
                }
            }
            Pattern::Asset(asset) => input.value.assets.get(asset.policy()).is_some_and(|names| {
                names.keys().any(|name| match asset.name() {
                    AssetNamePattern::Any => true,
                    AssetNamePattern::Exact(expected) => expected == name,
                })
            }),
            Pattern::OutputRef(_) => pattern.matches_output_ref(
                &input.output_reference.tx_id,
                input.output_reference.index,
            ),
            Pattern::TransactionId(_) => {
                pattern.matches_transaction_id(&input.output_reference.tx_id)
            }
            Pattern::Any => true,
        }
    }

    fn status_matches(status: StatusFlag, input: &Input) -> bool {
        match status {
            StatusFlag::All => true,
            StatusFlag::Unspent => input.spent_at.is_none(),
            StatusFlag::Spent => input.spent_at.is_some(),
        }
    }

    fn candidate_keys(&self, rx: &ReadTransaction, pattern: &Pattern) -> Result<Vec<Vec<u8>>, Error> {
        match pattern {
            Pattern::Any => {
                let table = rx.open_multimap_table(INPUTS_BY_SLOT)?;
                let mut out = Vec::new();
                for entry in table.iter()? {
                    let (_, values) = entry?;
                    for value in values {
                        out.push(value?.value().to_vec());
                    }
                }
                Ok(out)
            }
            Pattern::Address(argus_core::pattern::AddressPattern::Full(bytes)) => {
                let table = rx.open_multimap_table(INPUTS_BY_ADDRESS)?;
                let values = table.get(bytes.as_slice())?;
                values
                    .map(|v| v.map(|v| v.value().to_vec()).map_err(Error::from))
                    .collect()
            }
            Pattern::Address(argus_core::pattern::AddressPattern::Credentials { .. }) => {
                // No direct secondary index for decomposed credentials; fall
                // back to a full scan, same as the `Any` path.
                self.candidate_keys(rx, &Pattern::Any)
            }
            Pattern::Asset(asset) => {
                let table = rx.open_multimap_table(INPUTS_BY_POLICY)?;
                let values = table.get(asset.policy())?;
                values
                    .map(|v| v.map(|v| v.value().to_vec()).map_err(Error::from))
                    .collect()
            }
            Pattern::OutputRef(outref) => match outref.index() {
                OutputIndexPattern::Exact(ix) => Ok(vec![outref_key(outref.tx_id(), *ix)]),
                OutputIndexPattern::Any => {
                    let table = rx.open_multimap_table(INPUTS_BY_TXID)?;
                    let values = table.get(outref.tx_id())?;
                    values
                        .map(|v| v.map(|v| v.value().to_vec()).map_err(Error::from))
                        .collect()
                }
            },
            Pattern::TransactionId(tx_id) => {
                let table = rx.open_multimap_table(INPUTS_BY_TXID)?;
                let values = table.get(tx_id.as_slice())?;
                values
                    .map(|v| v.map(|v| v.value().to_vec()).map_err(Error::from))
                    .collect()
            }
        }
    }

    fn insert_input(wx: &WriteTransaction, input: &Input) -> Result<(), Error> {
        let key = outref_key(&input.output_reference.tx_id, input.output_reference.index);
        let encoded = encode_input(input)?;

        {
            let mut table = wx.open_table(INPUTS)?;
            table.insert(key.as_slice(), encoded.as_slice())?;
        }
        {
            let mut table = wx.open_multimap_table(INPUTS_BY_SLOT)?;
            table.insert(&input.created_at.slot().to_be_bytes()[..], key.as_slice())?;
        }
        {
            let mut table = wx.open_multimap_table(INPUTS_BY_ADDRESS)?;
            table.insert(input.address.as_slice(), key.as_slice())?;
        }
        for policy in input.value.assets.keys() {
            let mut table = wx.open_multimap_table(INPUTS_BY_POLICY)?;
            table.insert(policy.as_slice(), key.as_slice())?;
        }
        {
            let mut table = wx.open_multimap_table(INPUTS_BY_TXID)?;
            table.insert(input.output_reference.tx_id.as_slice(), key.as_slice())?;
        }

        Ok(())
    }

    fn remove_input(wx: &WriteTransaction, input: &Input) -> Result<(), Error> {
        let key = outref_key(&input.output_reference.tx_id, input.output_reference.index);

        {
            let mut table = wx.open_table(INPUTS)?;
            table.remove(key.as_slice())?;
        }
        {
            let mut table = wx.open_multimap_table(INPUTS_BY_SLOT)?;
            table.remove(&input.created_at.slot().to_be_bytes()[..], key.as_slice())?;
        }
        {
            let mut table = wx.open_multimap_table(INPUTS_BY_ADDRESS)?;
            table.remove(input.address.as_slice(), key.as_slice())?;
        }
        for policy in input.value.assets.keys() {
            let mut table = wx.open_multimap_table(INPUTS_BY_POLICY)?;
            table.remove(policy.as_slice(), key.as_slice())?;
        }
        {
            let mut table = wx.open_multimap_table(INPUTS_BY_TXID)?;
            table.remove(input.output_reference.tx_id.as_slice(), key.as_slice())?;
        }

        Ok(())
    }

    fn get_input(rx: &ReadTransaction, key: &[u8]) -> Result<Option<Input>, Error> {
        let table = rx.open_table(INPUTS)?;
        match table.get(key)? {
            Some(value) => Ok(Some(decode_input(value.value())?)),
            None => Ok(None),
        }
    }

    /// Same lookup as `get_input`, but reading through an open write
    /// transaction (redb tables opened from a `WriteTransaction` support
    /// reads too) so callers that mutate and read in the same transaction
    /// don't need a second one.
    fn get_input_wx(wx: &WriteTransaction, key: &[u8]) -> Result<Option<Input>, Error> {
        let table = wx.open_table(INPUTS)?;
        match table.get(key)? {
            Some(value) => Ok(Some(decode_input(value.value())?)),
            None => Ok(None),
        }
    }

    fn candidate_keys_wx(wx: &WriteTransaction, pattern: &Pattern) -> Result<Vec<Vec<u8>>, Error> {
        match pattern {
            Pattern::Any => {
                let table = wx.open_multimap_table(INPUTS_BY_SLOT)?;
                let mut out = Vec::new();
                for entry in table.iter()? {
                    let (_, values) = entry?;
                    for value in values {
                        out.push(value?.value().to_vec());
                    }
                }
                Ok(out)
            }
            Pattern::Address(argus_core::pattern::AddressPattern::Full(bytes)) => {
                let table = wx.open_multimap_table(INPUTS_BY_ADDRESS)?;
                let values = table.get(bytes.as_slice())?;
                values
                    .map(|v| v.map(|v| v.value().to_vec()).map_err(Error::from))
                    .collect()
            }
            Pattern::Address(argus_core::pattern::AddressPattern::Credentials { .. }) => {
                Self::candidate_keys_wx(wx, &Pattern::Any)
            }
            Pattern::Asset(asset) => {
                let table = wx.open_multimap_table(INPUTS_BY_POLICY)?;
                let values = table.get(asset.policy())?;
                values
                    .map(|v| v.map(|v| v.value().to_vec()).map_err(Error::from))
                    .collect()
            }
            Pattern::OutputRef(outref) => match outref.index() {
                OutputIndexPattern::Exact(ix) => Ok(vec![outref_key(outref.tx_id(), *ix)]),
                OutputIndexPattern::Any => {
                    let table = wx.open_multimap_table(INPUTS_BY_TXID)?;
                    let values = table.get(outref.tx_id())?;
                    values
                        .map(|v| v.map(|v| v.value().to_vec()).map_err(Error::from))
                        .collect()
                }
            },
            Pattern::TransactionId(tx_id) => {
                let table = wx.open_multimap_table(INPUTS_BY_TXID)?;
                let values = table.get(tx_id.as_slice())?;
                values
                    .map(|v| v.map(|v| v.value().to_vec()).map_err(Error::from))
                    .collect()
            }
        }
    }

    /// Delete every spend whose distance behind `tip_slot` exceeds
    /// `stability_window`, within an already-open write transaction. Shared
    /// by `apply_blocks` (inline, per batch) and `prune_inputs` (the
    /// gardener's periodic catch-up sweep).
    fn prune_stale_spends_wx(
        wx: &WriteTransaction,
        stability_window: u64,
        tip_slot: BlockSlot,
    ) -> Result<usize, Error> {
        let stale: Vec<Input> = {
            let table = wx.open_table(INPUTS)?;
            let mut out = Vec::new();
            for entry in table.iter()? {
                let (_, value) = entry?;
                let input = decode_input(value.value())?;
                if let Some(spent_at) = &input.spent_at {
                    if tip_slot.saturating_sub(spent_at.slot()) > stability_window {
                        out.push(input);
                    }
                }
            }
            out
        };
        let count = stale.len();
        for input in &stale {
            Self::remove_input(wx, input)?;
        }
        Ok(count)
    }
}

impl Store for RedbStore {
    async fn list_checkpoints_desc(&self) -> Result<Vec<Point>, StoreError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<Point>, Error> {
            let rx = this.begin_read()?;
            let table = rx.open_table(CHECKPOINTS)?;
            let mut out = Vec::new();
            for entry in table.iter()?.rev() {
                let (key, _) = entry?;
                let bytes: [u8; 40] = key.value().try_into().map_err(|_| {
                    Error::Decode("malformed checkpoint key".to_string())
                })?;
                out.push(Point::from_bytes(bytes));
            }
            Ok(out)
        })
        .await
        .map_err(|e| StoreError::Io(e.to_string()))?
        .map_err(Into::into)
    }

    async fn intersect_candidates(&self, max_items: usize) -> Result<Vec<Point>, StoreError> {
        let checkpoints = self.list_checkpoints_desc().await?;
        let mut out = Vec::with_capacity(max_items);
        let mut iter = checkpoints.into_iter();
        while let Some(point) = iter.next() {
            out.push(point);
            if out.len() >= max_items {
                break;
            }
            let skip = 2usize.pow(out.len() as u32) - 1;
            for _ in 0..skip {
                if iter.next().is_none() {
                    break;
                }
            }
        }
        Ok(out)
    }

    async fn list_ancestors_desc(
        &self,
        slot: BlockSlot,
        n: usize,
    ) -> Result<Vec<Point>, StoreError> {
        let all = self.list_checkpoints_desc().await?;
        Ok(all.into_iter().filter(|p| p.slot() < slot).take(n).collect())
    }

    async fn fold_inputs(
        &self,
        pattern: &Pattern,
        status: StatusFlag,
        sort: SortDirection,
    ) -> Result<Box<dyn Iterator<Item = Input> + Send>, StoreError> {
        let this = self.clone();
        let pattern = pattern.clone();
        let mut rows = tokio::task::spawn_blocking(move || -> Result<Vec<Input>, Error> {
            let rx = this.begin_read()?;
            let keys = this.candidate_keys(&rx, &pattern)?;
            let mut out = Vec::new();
            for key in keys {
                if let Some(input) = Self::get_input(&rx, &key)? {
                    if Self::input_matches(&pattern, &input) && Self::status_matches(status, &input) {
                        out.push(input);
                    }
                }
            }
            Ok(out)
        })
        .await
        .map_err(|e| StoreError::Io(e.to_string()))??;

        rows.sort_by(|a, b| {
            let key_a = (a.created_at.slot(), a.tx_index, a.output_reference.index);
            let key_b = (b.created_at.slot(), b.tx_index, b.output_reference.index);
            match sort {
                SortDirection::Asc => key_a.cmp(&key_b),
                SortDirection::Desc => key_b.cmp(&key_a),
            }
        });

        Ok(Box::new(rows.into_iter()))
    }

    async fn apply_blocks(
        &self,
        blocks: Vec<BlockApply>,
        input_management: InputManagement,
        stability_window: u64,
    ) -> Result<(), StoreError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || -> Result<(), Error> {
            let wx = this.begin_write()?;
            let mut tip_slot = None;

            for block in blocks {
                tip_slot = Some(block.checkpoint.slot());

                {
                    let mut table = wx.open_table(CHECKPOINTS)?;
                    table.insert(&block.checkpoint.into_bytes()[..], &b""[..])?;
                }

                for input in &block.new_inputs {
                    Self::insert_input(&wx, input)?;
                }

                for (reference, spent_at) in &block.spent {
                    let key = outref_key(&reference.tx_id, reference.index);
                    if let Some(mut input) = Self::get_input(&wx, &key)? {
                        input.spent_at = Some(spent_at.clone());
                        let encoded = encode_input(&input)?;
                        let mut table = wx.open_table(INPUTS)?;
                        table.insert(key.as_slice(), encoded.as_slice())?;
                    }
                }

                for datum in &block.binary_data {
                    let mut table = wx.open_table(BINARY_DATA)?;
                    table.insert(datum.hash.as_slice(), datum.bytes.as_slice())?;
                }

                for script in &block.scripts {
                    let mut table = wx.open_table(SCRIPTS)?;
                    let encoded = bincode::serialize(script).map_err(|e| Error::Decode(e.to_string()))?;
                    table.insert(script.hash.as_slice(), encoded.as_slice())?;
                }
            }

            if input_management == InputManagement::RemoveSpentInputs {
                if let Some(tip_slot) = tip_slot {
                    Self::prune_stale_spends_wx(&wx, stability_window, tip_slot)?;
                }
            }

            wx.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Io(e.to_string()))?
        .map_err(Into::into)
    }

    async fn rollback_to(&self, slot: BlockSlot) -> Result<Option<BlockSlot>, StoreError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || -> Result<Option<BlockSlot>, Error> {
            let wx = this.begin_write()?;

            let to_forget: Vec<Input> = {
                let slot_table = wx.open_multimap_table(INPUTS_BY_SLOT)?;
                let mut forget = Vec::new();
                for entry in slot_table.iter()? {
                    let (key, values) = entry?;
                    let entry_slot = u64::from_be_bytes(key.value().try_into().map_err(|_| {
                        Error::Decode("malformed slot key".to_string())
                    })?);
                    if entry_slot <= slot {
                        continue;
                    }
                    for value in values {
                        let outref_key = value?.value().to_vec();
                        if let Some(input) = Self::get_input_wx(&wx, &outref_key)? {
                            forget.push(input);
                        }
                    }
                }
                forget
            };

            for input in &to_forget {
                Self::remove_input(&wx, input)?;
            }

            {
                let all_inputs: Vec<Input> = {
                    let table = wx.open_table(INPUTS)?;
                    let mut out = Vec::new();
                    for entry in table.iter()? {
                        let (_, value) = entry?;
                        out.push(decode_input(value.value())?);
                    }
                    out
                };

                for mut input in all_inputs {
                    if let Some(spent_at) = &input.spent_at {
                        if spent_at.slot() > slot {
                            input.spent_at = None;
                            let key = outref_key(&input.output_reference.tx_id, input.output_reference.index);
                            let encoded = encode_input(&input)?;
                            let mut table = wx.open_table(INPUTS)?;
                            table.insert(key.as_slice(), encoded.as_slice())?;
                        }
                    }
                }
            }

            {
                let mut table = wx.open_table(CHECKPOINTS)?;
                let cutoff = Point::Specific(slot + 1, vec![0u8; 32]).into_bytes();
                let cutoff_slice: &[u8] = &cutoff;
                let mut to_remove = table.extract_from_if(cutoff_slice.., |_, _| true)?;
                while to_remove.next().is_some() {}
            }

            let latest = {
                let table = wx.open_table(CHECKPOINTS)?;
                table
                    .iter()?
                    .next_back()
                    .transpose()?
                    .map(|(key, _)| {
                        let bytes: [u8; 40] = key.value().try_into().unwrap();
                        Point::from_bytes(bytes).slot()
                    })
            };

            wx.commit()?;
            Ok(latest)
        })
        .await
        .map_err(|e| StoreError::Io(e.to_string()))?
        .map_err(Into::into)
    }

    async fn get_binary_data(&self, hash: &[u8]) -> Result<Option<BinaryData>, StoreError> {
        let this = self.clone();
        let hash = hash.to_vec();
        tokio::task::spawn_blocking(move || -> Result<Option<BinaryData>, Error> {
            let rx = this.begin_read()?;
            let table = rx.open_table(BINARY_DATA)?;
            Ok(table.get(hash.as_slice())?.map(|v| BinaryData {
                hash: hash.clone(),
                bytes: v.value().to_vec(),
            }))
        })
        .await
        .map_err(|e| StoreError::Io(e.to_string()))?
        .map_err(Into::into)
    }

    async fn get_script(&self, hash: &[u8]) -> Result<Option<Script>, StoreError> {
        let this = self.clone();
        let hash = hash.to_vec();
        tokio::task::spawn_blocking(move || -> Result<Option<Script>, Error> {
            let rx = this.begin_read()?;
            let table = rx.open_table(SCRIPTS)?;
            match table.get(hash.as_slice())? {
                Some(v) => Ok(Some(
                    bincode::deserialize(v.value()).map_err(|e| Error::Decode(e.to_string()))?,
                )),
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| StoreError::Io(e.to_string()))?
        .map_err(Into::into)
    }

    async fn list_patterns(&self) -> Result<Vec<Pattern>, StoreError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<Pattern>, Error> {
            let rx = this.begin_read()?;
            let table = rx.open_table(PATTERNS)?;
            let mut out = Vec::new();
            for entry in table.iter()? {
                let (_, value) = entry?;
                out.push(bincode::deserialize(value.value()).map_err(|e| Error::Decode(e.to_string()))?);
            }
            Ok(out)
        })
        .await
        .map_err(|e| StoreError::Io(e.to_string()))?
        .map_err(Into::into)
    }

    async fn insert_patterns(&self, patterns: &[Pattern]) -> Result<(), StoreError> {
        let this = self.clone();
        let patterns = patterns.to_vec();
        tokio::task::spawn_blocking(move || -> Result<(), Error> {
            let wx = this.begin_write()?;
            {
                let mut table = wx.open_table(PATTERNS)?;
                for pattern in &patterns {
                    let encoded = bincode::serialize(pattern).map_err(|e| Error::Decode(e.to_string()))?;
                    table.insert(pattern.to_text().as_bytes(), encoded.as_slice())?;
                }
            }
            wx.commit()?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Io(e.to_string()))?
        .map_err(Into::into)
    }

    async fn delete_pattern(&self, pattern: &Pattern) -> Result<usize, StoreError> {
        let this = self.clone();
        let text = pattern.to_text();
        tokio::task::spawn_blocking(move || -> Result<usize, Error> {
            let wx = this.begin_write()?;
            let removed = {
                let mut table = wx.open_table(PATTERNS)?;
                table.remove(text.as_bytes())?.is_some()
            };
            wx.commit()?;
            Ok(removed as usize)
        })
        .await
        .map_err(|e| StoreError::Io(e.to_string()))?
        .map_err(Into::into)
    }

    async fn delete_inputs(&self, pattern: &Pattern) -> Result<usize, StoreError> {
        let this = self.clone();
        let pattern = pattern.clone();
        tokio::task::spawn_blocking(move || -> Result<usize, Error> {
            let wx = this.begin_write()?;
            let matching: Vec<Input> = {
                let keys = Self::candidate_keys_wx(&wx, &pattern)?;
                let mut out = Vec::new();
                for key in keys {
                    if let Some(input) = Self::get_input_wx(&wx, &key)? {
                        if Self::input_matches(&pattern, &input) {
                            out.push(input);
                        }
                    }
                }
                out
            };
            let count = matching.len();
            for input in &matching {
                Self::remove_input(&wx, input)?;
            }
            wx.commit()?;
            Ok(count)
        })
        .await
        .map_err(|e| StoreError::Io(e.to_string()))?
        .map_err(Into::into)
    }

    async fn prune_inputs(
        &self,
        stability_window: u64,
        tip_slot: BlockSlot,
    ) -> Result<usize, StoreError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || -> Result<usize, Error> {
            let wx = this.begin_write()?;
            let count = Self::prune_stale_spends_wx(&wx, stability_window, tip_slot)?;
            wx.commit()?;
            Ok(count)
        })
        .await
        .map_err(|e| StoreError::Io(e.to_string()))?
        .map_err(Into::into)
    }

    async fn prune_binary_data(&self) -> Result<usize, StoreError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || -> Result<usize, Error> {
            let wx = this.begin_write()?;

            let live: std::collections::HashSet<Vec<u8>> = {
                let table = wx.open_table(INPUTS)?;
                let mut live = std::collections::HashSet::new();
                for entry in table.iter()? {
                    let (_, value) = entry?;
                    let input = decode_input(value.value())?;
                    if let Some(hash) = input.datum_hash {
                        live.insert(hash);
                    }
                }
                live
            };

            let orphaned: Vec<Vec<u8>> = {
                let table = wx.open_table(BINARY_DATA)?;
                let mut out = Vec::new();
                for entry in table.iter()? {
                    let (key, _) = entry?;
                    let hash = key.value().to_vec();
                    if !live.contains(&hash) {
                        out.push(hash);
                    }
                }
                out
            };

            let count = orphaned.len();
            {
                let mut table = wx.open_table(BINARY_DATA)?;
                for hash in &orphaned {
                    table.remove(hash.as_slice())?;
                }
            }

            wx.commit()?;
            Ok(count)
        })
        .await
        .map_err(|e| StoreError::Io(e.to_string()))?
        .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::result::Value;

    fn sample_input(slot: u64, tx_id: Vec<u8>, index: u32) -> Input {
        Input {
            output_reference: OutputReference { tx_id, index },
            address: vec![1, 2, 3],
            value: Value::default(),
            datum_hash: None,
            script_hash: None,
            created_at: Point::Specific(slot, vec![slot as u8; 32]),
            spent_at: None,
            tx_index: 0,
        }
    }

    fn sample_input_at_tx(slot: u64, tx_id: Vec<u8>, index: u32, tx_index: u32) -> Input {
        let mut input = sample_input(slot, tx_id, index);
        input.tx_index = tx_index;
        input
    }

    #[tokio::test]
    async fn apply_then_rollback_erases_the_future() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("argus.redb")).unwrap();

        let block = BlockApply {
            checkpoint: Point::Specific(5, vec![5u8; 32]),
            new_inputs: vec![sample_input(5, vec![9u8; 32], 0)],
            spent: vec![],
            binary_data: vec![],
            scripts: vec![],
        };
        store
            .apply_blocks(vec![block], argus_core::store::InputManagement::MarkSpentInputs, 0)
            .await
            .unwrap();

        let checkpoints = store.list_checkpoints_desc().await.unwrap();
        assert_eq!(checkpoints, vec![Point::Specific(5, vec![5u8; 32])]);

        let latest = store.rollback_to(0).await.unwrap();
        assert_eq!(latest, None);

        let checkpoints = store.list_checkpoints_desc().await.unwrap();
        assert!(checkpoints.is_empty());

        let rows: Vec<Input> = store
            .fold_inputs(&Pattern::Any, StatusFlag::All, SortDirection::Asc)
            .await
            .unwrap()
            .collect();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn fold_inputs_breaks_same_slot_same_index_ties_by_tx_position() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("argus.redb")).unwrap();

        let block = BlockApply {
            checkpoint: Point::Specific(7, vec![7u8; 32]),
            new_inputs: vec![
                sample_input_at_tx(7, vec![2u8; 32], 0, 1),
                sample_input_at_tx(7, vec![1u8; 32], 0, 0),
            ],
            spent: vec![],
            binary_data: vec![],
            scripts: vec![],
        };
        store
            .apply_blocks(vec![block], argus_core::store::InputManagement::MarkSpentInputs, 0)
            .await
            .unwrap();

        let rows: Vec<Input> = store
            .fold_inputs(&Pattern::Any, StatusFlag::All, SortDirection::Asc)
            .await
            .unwrap()
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tx_index, 0);
        assert_eq!(rows[1].tx_index, 1);
    }

    #[tokio::test]
    async fn remove_spent_inputs_deletes_stale_spends_inline_on_apply() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("argus.redb")).unwrap();

        let tx_id = vec![9u8; 32];
        let spend = BlockApply {
            checkpoint: Point::Specific(3, vec![3u8; 32]),
            new_inputs: vec![sample_input(3, tx_id.clone(), 0)],
            spent: vec![(OutputReference { tx_id: tx_id.clone(), index: 0 }, Point::Specific(3, vec![3u8; 32]))],
            binary_data: vec![],
            scripts: vec![],
        };
        store
            .apply_blocks(vec![spend], argus_core::store::InputManagement::RemoveSpentInputs, 10)
            .await
            .unwrap();

        let rows: Vec<Input> = store
            .fold_inputs(&Pattern::Any, StatusFlag::All, SortDirection::Asc)
            .await
            .unwrap()
            .collect();
        assert_eq!(rows.len(), 1, "spend within the stability window stays marked, not removed");

        let advance = BlockApply {
            checkpoint: Point::Specific(20, vec![20u8; 32]),
            new_inputs: vec![],
            spent: vec![],
            binary_data: vec![],
            scripts: vec![],
        };
        store
            .apply_blocks(vec![advance], argus_core::store::InputManagement::RemoveSpentInputs, 10)
            .await
            .unwrap();

        let rows: Vec<Input> = store
            .fold_inputs(&Pattern::Any, StatusFlag::All, SortDirection::Asc)
            .await
            .unwrap()
            .collect();
        assert!(rows.is_empty(), "spend past the stability window is deleted once the tip advances");
    }
}
