use minifb::{Key, Window, WindowOptions};
use rand::Rng;
use scroller_rl::{Env, Frame, JoypadSpace, ScrollerEnv};

fn rgb_to_u32(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
}

fn blit(frame: &Frame, buffer: &mut [u32]) {
    for (dst, px) in buffer.iter_mut().zip(frame.data.chunks_exact(3)) {
        *dst = rgb_to_u32(px[0], px[1], px[2]);
    }
}

fn main() {
    let mut env = JoypadSpace::simple_movement(ScrollerEnv::new(1, 42));
    let n_actions = env.action_space().n();
    let (mut frame, _info) = env.reset();
    let (width, height) = (frame.width as usize, frame.height as usize);

    let mut window = Window::new(
        "scroller-rl: random agent",
        width,
        height,
        WindowOptions::default(),
    )
    .expect("Unable to open window");

    let mut buffer: Vec<u32> = vec![0; width * height];
    let mut rng = rand::thread_rng();

    // Run until the window is closed or Escape pressed
    while window.is_open() && !window.is_key_down(Key::Escape) {
        let action: u32 = rng.gen_range(0..n_actions);
        let step = env.step(action);
        frame = step.observation;
        if step.terminated || step.truncated {
            let (obs, _info) = env.reset();
            frame = obs;
        }

        blit(&frame, &mut buffer);
        window
            .update_with_buffer(&buffer, width, height)
            .expect("Failed to update window buffer");
    }
}
