use crate::domain::DataPoint;

/// A durable progress marker the connector resumes from (a timestamp, a change
/// id, ...). Written by the checkpoint sequencer only, after every batch up to
/// the marker has been accepted by the remote side.
pub trait CheckpointStore: Send + Sync {
    /// False on the very first connector run, meaning "read everything".
    fn is_valid(&self) -> bool;

    /// The current checkpoint value.
    fn get(&self) -> String;

    /// Durably advance the checkpoint to the given marker.
    fn accept(&self, new_checkpoint: &str);
}

/// The record source the connector polls data from.
pub trait DataSource: Send {
    /// Read the records that changed since the given checkpoint, each tagged
    /// with the marker valid as of that record. The sequence is finite per
    /// call; the next call resumes from whatever the store holds by then.
    fn read_next(
        &mut self,
        checkpoint: &dyn CheckpointStore,
    ) -> Box<dyn Iterator<Item = DataPoint> + Send + '_>;
}
