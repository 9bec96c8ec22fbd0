pub const SET_DIFFICULTY_PACKET: u8 = 0xb0;
