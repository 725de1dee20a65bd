use libm;

pub const PI: f64 = 3.141592653589793238462643383279506939937;
pub const RAD2DEGF: f32 = 180.0 / PI as f32;

#[inline(always)]
pub fn cartesian_to_polar_magnitude<const N: usize>(cart: [f32; N]) -> f32 {
    let mut mag: f32 = 0.0;
    for i in 0..N {
        mag += cart[i] * cart[i];
    }
    libm::sqrtf(mag)
}

/// Elementwise radians to degrees, for logging angle triples
#[inline(always)]
pub fn to_degrees<const N: usize>(rad: [f32; N]) -> [f32; N] {
    let mut deg = rad;
    for d in deg.iter_mut() {
        *d *= RAD2DEGF;
    }
    deg
}
