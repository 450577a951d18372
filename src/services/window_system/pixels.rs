//! Преобразование пикселей иконки из DIB (BGRA) в RGBA.
//!
//! Иконки без альфа-канала (старые 24-битные) описывают прозрачность
//! AND-маской: белый пиксель маски означает прозрачный пиксель.
#![cfg_attr(not(windows), allow(dead_code))]

/// Хотя бы один пиксель с ненулевой альфой
pub fn has_alpha(bgra: &[u8]) -> bool {
    bgra.chunks_exact(4).any(|pixel| pixel[3] != 0)
}

/// Альфа по AND-маске, прочитанной в тот же 32-битный формат
pub fn apply_mask_alpha(bgra: &mut [u8], mask_bgra: &[u8]) {
    for (pixel, mask) in bgra.chunks_exact_mut(4).zip(mask_bgra.chunks_exact(4)) {
        let transparent = mask[..3].iter().any(|&b| b != 0);
        pixel[3] = if transparent { 0 } else { 0xFF };
    }
}

/// Итоговые RGBA-пиксели. `mask` используется только когда в цвете нет альфы;
/// без маски такая иконка считается полностью непрозрачной
pub fn icon_rgba(mut bgra: Vec<u8>, mask: Option<&[u8]>) -> Vec<u8> {
    if !has_alpha(&bgra) {
        match mask {
            Some(mask) => apply_mask_alpha(&mut bgra, mask),
            None => bgra.chunks_exact_mut(4).for_each(|pixel| pixel[3] = 0xFF),
        }
    }
    for pixel in bgra.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }
    bgra
}
