use crate::events::{AssemblerEvent, SynthesisRequest};

pub trait AssemblerRuntime: Send + Sync + 'static {
    /// Hand a segment to its lane's synthesis producer. At most one request
    /// per lane is outstanding at any time.
    fn synthesize(&self, request: SynthesisRequest);
    fn emit(&self, event: AssemblerEvent);
}
