//! Inbound and outbound dispatch.
//!
//! [`dispatch`] routes one protocol event to the handler for its family. Each
//! handler runs to completion against the [`AppContext`] before the next event
//! is polled, so no handler ever observes another half-applied.

pub mod inbound;
pub mod outbound;
pub mod room;

use crate::context::AppContext;
use crate::protocol::InboundEvent;

pub fn dispatch(ctx: &mut AppContext, event: InboundEvent) {
    match event {
        InboundEvent::Room(room_event) => room::handle(ctx, room_event),
        other => inbound::handle(ctx, other),
    }
}

/// Dispatches everything the transport has queued. Returns how many events
/// were handled.
pub fn drain_transport(ctx: &mut AppContext) -> usize {
    let mut handled = 0;
    while let Some(event) = ctx.transport.poll_event() {
        dispatch(ctx, event);
        handled += 1;
    }
    handled
}
