use duet_assembler::{AssemblerEvent, AssemblerRuntime, SynthesisRequest};
use duet_script::Speaker;
use tokio::sync::mpsc;

pub struct LaneReceivers {
    pub a: mpsc::UnboundedReceiver<SynthesisRequest>,
    pub b: mpsc::UnboundedReceiver<SynthesisRequest>,
}

/// Routes synthesis requests to one channel per lane and forwards
/// assembler events to the printer.
pub struct CliRuntime {
    lane_a: mpsc::UnboundedSender<SynthesisRequest>,
    lane_b: mpsc::UnboundedSender<SynthesisRequest>,
    events: mpsc::UnboundedSender<AssemblerEvent>,
}

impl CliRuntime {
    pub fn new() -> (Self, LaneReceivers, mpsc::UnboundedReceiver<AssemblerEvent>) {
        let (lane_a, a) = mpsc::unbounded_channel();
        let (lane_b, b) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();

        (
            Self {
                lane_a,
                lane_b,
                events,
            },
            LaneReceivers { a, b },
            events_rx,
        )
    }
}

impl AssemblerRuntime for CliRuntime {
    fn synthesize(&self, request: SynthesisRequest) {
        let lane = request.lane;
        let tx = match lane {
            Speaker::A => &self.lane_a,
            Speaker::B => &self.lane_b,
        };
        if tx.send(request).is_err() {
            tracing::warn!(%lane, "lane_producer_gone");
        }
    }

    fn emit(&self, event: AssemblerEvent) {
        let _ = self.events.send(event);
    }
}
