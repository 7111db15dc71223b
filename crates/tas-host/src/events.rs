/// What the runtime reports back to the shell.
#[derive(Debug)]
pub enum EditorEvent {
    Log(String),
    CursorMoved(usize),
    SeekFinished(usize),
    Error(String),
    /// Response to `SaveProject`: the serialized project bytes. Writing
    /// them anywhere is the shell's business.
    ProjectSerialized(Vec<u8>),
}
