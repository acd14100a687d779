//! Serialization for moving data between processes without a shared file.

use covdata_core::debug;
use covdata_core::errors::CoverageResult;

use super::CoverageData;
use crate::connection::open_connection;
use crate::dump;
use crate::to_storage_err;

impl CoverageData {
    /// Serialize the whole database to bytes, for `loads`.
    pub fn dumps(&self) -> CoverageResult<Vec<u8>> {
        let mut state = self.lock("dumps")?;
        self.debug.write_if(debug::DATAIO, || {
            format!("Dumping data from data file {:?}", state.location.display_name())
        });
        self.ensure_connection(&mut state)?;
        let script = dump::dump_script(state.conns.require()?)?;
        Ok(dump::compress_script(&script)?)
    }

    /// Replace this object's data with data serialized by `dumps`.
    ///
    /// Meant for a newly created object; any data it held is erased first.
    pub fn loads(&self, data: &[u8]) -> CoverageResult<()> {
        let script = dump::decompress_script(data)?;

        let mut state = self.lock("loads")?;
        self.debug.write_if(debug::DATAIO, || {
            format!(
                "Loading data into data file {:?}",
                state.location.display_name()
            )
        });
        self.check_fork(&mut state)?;
        self.erase_locked(&mut state, false)?;

        let state = &mut *state;
        let conn = open_connection(&state.location)?;
        conn.execute_batch(&script).map_err(to_storage_err)?;
        self.read_db(&conn, &state.location, &mut state.cache)?;
        state.conns.set_current(conn);
        state.have_used = true;
        Ok(())
    }
}
