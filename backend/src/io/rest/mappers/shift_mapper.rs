use shared::{Handoff, Shift as SharedShift, SwapShiftResponse};

use super::{opt_timestamp, timestamp};
use crate::domain::commands::shifts::SwapResult;
use crate::domain::models::{Shift, ShiftHandoff};

pub struct ShiftMapper;

impl ShiftMapper {
    pub fn to_shift_dto(shift: Shift) -> SharedShift {
        SharedShift {
            starts_at: timestamp(&shift.starts_at),
            ends_at: timestamp(&shift.ends_at),
            clock_in_at: opt_timestamp(&shift.clock_in_at),
            clock_out_at: opt_timestamp(&shift.clock_out_at),
            status: shift.status.as_str().to_string(),
            id: shift.id,
            recipient_id: shift.recipient_id,
            template_id: shift.template_id,
            caregiver_id: shift.caregiver_id,
            title_enc: shift.title_enc,
        }
    }

    pub fn to_swap_response(result: SwapResult) -> SwapShiftResponse {
        SwapShiftResponse {
            original: Self::to_shift_dto(result.original),
            replacement: Self::to_shift_dto(result.replacement),
            success_message: "Shift swapped".to_string(),
        }
    }

    pub fn to_handoff_dto(handoff: ShiftHandoff) -> Handoff {
        Handoff {
            created_at: timestamp(&handoff.created_at),
            id: handoff.id,
            shift_id: handoff.shift_id,
            author_id: handoff.author_id,
            notes_enc: handoff.notes_enc,
        }
    }
}
