use duet_core::RoomId;

/// Actions requested by the local user.
#[derive(Debug, Clone)]
pub enum CallCommand {
    JoinRoom { email: String, room: RoomId },

    /// Call the participant announced by `user:joined`.
    Call,

    /// Attach local tracks to the running call.
    SendStreams,

    /// Hang up. The remote participant is remembered for `Reconnect`.
    Disconnect,

    /// Start over with a fresh session and call the remembered participant again.
    Reconnect,
}
