//! Single-byte XOR masking
//!
//! Some captures arrive with every byte XORed against a fixed key. The mask
//! is its own inverse, so the same functions apply and remove it.

/// Remove (or apply) the mask in place
pub fn unmask_in_place(buf: &mut [u8], key: u8) {
    if key == 0 {
        return;
    }
    for byte in buf.iter_mut() {
        *byte ^= key;
    }
}

/// Copying variant of [`unmask_in_place`]
pub fn unmask(buf: &[u8], key: u8) -> Vec<u8> {
    buf.iter().map(|byte| byte ^ key).collect()
}
