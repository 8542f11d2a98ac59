use crate::{
    context::RequestContext,
    decision::{BarSummary, Decision, NoBarReason, ResolvedMessage},
    events::BarEvent,
    models::BarConfig,
    rotation,
    sharder::Sharder,
    targeting, variant,
};

impl BarConfig {
    /// Resolve which message (if any) to show for `ctx`.
    ///
    /// This is a pure function: the returned impression event has to be recorded by the caller.
    /// Inactive or out-of-schedule bars short-circuit before any message is looked at and never
    /// produce an event.
    pub fn eval(
        &self,
        ctx: &RequestContext,
        sharder: &impl Sharder,
    ) -> (Decision, Option<BarEvent>) {
        if !self.is_active {
            return (Decision::NoBar(NoBarReason::Inactive), None);
        }
        if !self.is_within_schedule(ctx.now) {
            return (Decision::NoBar(NoBarReason::OutsideSchedule), None);
        }

        let eligible = targeting::filter(self.ordered_messages(), ctx);
        let Some(message) = rotation::select(&eligible, self, ctx) else {
            return (
                Decision::NoMessage {
                    bar: BarSummary::from(self),
                },
                None,
            );
        };

        let rendered = variant::resolve(message, ctx, sharder);
        let event = BarEvent::impression(self.id, message.id, rendered.variant, ctx);

        (
            Decision::Show {
                bar: BarSummary::from(self),
                message: ResolvedMessage::new(message, rendered),
            },
            Some(event),
        )
    }
}
