use super::GpsPosition;

/// PX4GPS position/velocity log (message id 8001), binary form.
///
/// The receiver fills this message with the fields of the PX4 `vehicle_gps_position`
/// topic, packed and little-endian, without the leading capture timestamp.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Px4Gps {
    /// UTC time, microseconds since the Unix epoch
    pub time_utc_usec: u64,
    /// Latitude, 1e-7 degrees
    pub lat: i32,
    /// Longitude, 1e-7 degrees
    pub lon: i32,
    /// Altitude above MSL, millimeters
    pub alt: i32,
    /// Altitude above the ellipsoid, millimeters
    pub alt_ellipsoid: i32,
    pub s_variance_m_s: f32,
    pub c_variance_rad: f32,
    pub eph: f32,
    pub epv: f32,
    pub hdop: f32,
    pub vdop: f32,
    pub noise_per_ms: i32,
    pub jamming_indicator: i32,
    pub vel_m_s: f32,
    pub vel_n_m_s: f32,
    pub vel_e_m_s: f32,
    pub vel_d_m_s: f32,
    pub cog_rad: f32,
    pub timestamp_time_relative: i32,
    pub heading: f32,
    pub fix_type: u8,
    pub vel_ned_valid: bool,
    pub satellites_used: u8,
}

impl Px4Gps {
    pub const PAYLOAD_LEN: usize = 87;

    /// Reads the fixed layout out of `payload`. Missing trailing bytes read as zero,
    /// extra bytes are ignored.
    pub fn from_payload(payload: &[u8]) -> Self {
        let mut bytes = [0u8; Self::PAYLOAD_LEN];
        let len = payload.len().min(Self::PAYLOAD_LEN);
        bytes[..len].copy_from_slice(&payload[..len]);

        let mut r = FieldReader::new(&bytes);
        Self {
            time_utc_usec: r.u64(),
            lat: r.i32(),
            lon: r.i32(),
            alt: r.i32(),
            alt_ellipsoid: r.i32(),
            s_variance_m_s: r.f32(),
            c_variance_rad: r.f32(),
            eph: r.f32(),
            epv: r.f32(),
            hdop: r.f32(),
            vdop: r.f32(),
            noise_per_ms: r.i32(),
            jamming_indicator: r.i32(),
            vel_m_s: r.f32(),
            vel_n_m_s: r.f32(),
            vel_e_m_s: r.f32(),
            vel_d_m_s: r.f32(),
            cog_rad: r.f32(),
            timestamp_time_relative: r.i32(),
            heading: r.f32(),
            fix_type: r.u8(),
            vel_ned_valid: r.u8() != 0,
            satellites_used: r.u8(),
        }
    }

    /// Copies every field into `position`, leaving the capture timestamp alone.
    pub fn copy_into(&self, position: &mut GpsPosition) {
        position.time_utc_usec = self.time_utc_usec;
        position.lat = self.lat;
        position.lon = self.lon;
        position.alt = self.alt;
        position.alt_ellipsoid = self.alt_ellipsoid;
        position.s_variance_m_s = self.s_variance_m_s;
        position.c_variance_rad = self.c_variance_rad;
        position.eph = self.eph;
        position.epv = self.epv;
        position.hdop = self.hdop;
        position.vdop = self.vdop;
        position.noise_per_ms = self.noise_per_ms;
        position.jamming_indicator = self.jamming_indicator;
        position.vel_m_s = self.vel_m_s;
        position.vel_n_m_s = self.vel_n_m_s;
        position.vel_e_m_s = self.vel_e_m_s;
        position.vel_d_m_s = self.vel_d_m_s;
        position.cog_rad = self.cog_rad;
        position.timestamp_time_relative = self.timestamp_time_relative;
        position.heading = self.heading;
        position.fix_type = self.fix_type;
        position.vel_ned_valid = self.vel_ned_valid;
        position.satellites_used = self.satellites_used;
    }
}

struct FieldReader<'a> {
    bytes: &'a [u8; Px4Gps::PAYLOAD_LEN],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(bytes: &'a [u8; Px4Gps::PAYLOAD_LEN]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u8(&mut self) -> u8 {
        u8::from_le_bytes(self.take())
    }

    fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take())
    }

    fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.take())
    }
}
