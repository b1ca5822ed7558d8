use redb::{MultimapTableDefinition, TableDefinition, WriteTransaction};

pub type ValueTable = TableDefinition<'static, &'static [u8], &'static [u8]>;
pub type MultiValueTable = MultimapTableDefinition<'static, &'static [u8], &'static [u8]>;

pub const CHECKPOINTS: ValueTable = TableDefinition::new("checkpoints");
pub const INPUTS: ValueTable = TableDefinition::new("inputs");
pub const PATTERNS: ValueTable = TableDefinition::new("patterns");
pub const BINARY_DATA: ValueTable = TableDefinition::new("binary_data");
pub const SCRIPTS: ValueTable = TableDefinition::new("scripts");

pub const INPUTS_BY_SLOT: MultiValueTable = MultimapTableDefinition::new("inputs_by_slot");
pub const INPUTS_BY_ADDRESS: MultiValueTable = MultimapTableDefinition::new("inputs_by_address");
pub const INPUTS_BY_POLICY: MultiValueTable = MultimapTableDefinition::new("inputs_by_policy");
pub const INPUTS_BY_TXID: MultiValueTable = MultimapTableDefinition::new("inputs_by_txid");

pub enum Table {
    Value(ValueTable),
    MultiValue(MultiValueTable),
}

impl Table {
    pub fn initialize(&self, wx: &mut WriteTransaction) -> Result<(), redb::TableError> {
        match self {
            Table::Value(def) => {
                wx.open_table(*def)?;
            }
            Table::MultiValue(def) => {
                wx.open_multimap_table(*def)?;
            }
        }
        Ok(())
    }
}

pub fn all() -> Vec<Table> {
    vec![
        Table::Value(CHECKPOINTS),
        Table::Value(INPUTS),
        Table::Value(PATTERNS),
        Table::Value(BINARY_DATA),
        Table::Value(SCRIPTS),
        Table::MultiValue(INPUTS_BY_SLOT),
        Table::MultiValue(INPUTS_BY_ADDRESS),
        Table::MultiValue(INPUTS_BY_POLICY),
        Table::MultiValue(INPUTS_BY_TXID),
    ]
}
